//! Streamed gzip/tar extraction.
//!
//! Module archives wrap their contents in a single top-level directory
//! whose name is an upstream artifact (release slug, commit hash). That
//! directory is stripped so files land directly under the target folder.

use std::fs;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::error::FetchError;

pub fn extract_stripped<R: Read>(reader: R, target: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(target).map_err(|e| FetchError::filesystem(target, e, true))?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| FetchError::artifact(format!("could not read archive: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| FetchError::artifact(format!("could not read archive entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| FetchError::artifact(format!("bad path in archive: {}", e)))?
            .into_owned();

        let mut components = path.components();
        components.next(); // the archive's own root folder
        let stripped = components.as_path();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        if stripped.components().any(|c| {
            matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
        }) {
            return Err(FetchError::artifact(format!(
                "archive entry escapes target folder: {}",
                path.display()
            )));
        }

        let dest = target.join(stripped);
        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| FetchError::filesystem(&dest, e, true))?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| FetchError::filesystem(parent, e, true))?;
            }
            entry
                .unpack(&dest)
                .map_err(|e| FetchError::artifact(format!("could not unpack {}: {}", dest.display(), e)))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn archive_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, contents) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, contents.as_bytes()).expect("append");
        }
        let encoder = builder.into_inner().expect("finish tar");
        encoder.finish().expect("finish gzip")
    }

    #[test]
    fn strips_the_top_level_directory() {
        let tmp = tempfile::tempdir().expect("tmp");
        let target = tmp.path().join("apache");
        let archive = archive_with(&[
            ("puppetlabs-apache-1.2.3/manifests/init.pp", "class apache {}\n"),
            ("puppetlabs-apache-1.2.3/metadata.json", "{}\n"),
        ]);

        extract_stripped(&archive[..], &target).expect("extract");

        assert!(target.join("manifests/init.pp").is_file());
        assert!(target.join("metadata.json").is_file());
        assert!(!target.join("puppetlabs-apache-1.2.3").exists());
        let init = fs::read_to_string(target.join("manifests/init.pp")).expect("read");
        assert_eq!(init, "class apache {}\n");
    }

    #[test]
    fn rejects_parent_dir_escapes() {
        let tmp = tempfile::tempdir().expect("tmp");
        let target = tmp.path().join("out");

        // tar::Builder::append_data validates paths and refuses to write
        // `..` components, so a malicious entry has to be assembled by
        // hand: write the raw name bytes and skip the crate's own check.
        let contents = b"boom";
        let mut header = tar::Header::new_gnu();
        let name = b"pkg/../../evil.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder.append(&header, &contents[..]).expect("append");
        let encoder = builder.into_inner().expect("finish tar");
        let archive = encoder.finish().expect("finish gzip");

        let err = extract_stripped(&archive[..], &target).expect_err("must refuse");
        assert!(err.retryable());
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn garbage_is_an_artifact_error() {
        let tmp = tempfile::tempdir().expect("tmp");
        let err = extract_stripped(&b"not a tarball"[..], tmp.path()).expect_err("must fail");
        assert_eq!(err.kind(), crate::error::FetchErrorKind::Artifact);
    }
}
