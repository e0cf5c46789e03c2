//! The three module kinds and their shared contract.
//!
//! The set is closed on purpose: exhaustive matches keep the pipeline
//! honest when a variant grows a new behavior.

mod forge;
mod git;
mod tarball;

pub use forge::{ForgeModule, DEFAULT_FORGE_URL};
pub use git::GitModule;
pub use tarball::{TarballModule, DEFAULT_TARBALL_API_URL};

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::cache::Cache;
use crate::error::FetchError;

/// One entry of a Puppetfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Module {
    Forge(ForgeModule),
    Git(GitModule),
    Tarball(TarballModule),
}

impl Module {
    pub fn name(&self) -> &str {
        match self {
            Module::Forge(m) => m.name(),
            Module::Git(m) => m.name(),
            Module::Tarball(m) => m.name(),
        }
    }

    /// Cache-slot and lock key. Modules sharing a fingerprint share one
    /// cache folder and serialize their downloads.
    pub fn fingerprint(&self) -> String {
        match self {
            Module::Forge(m) => m.fingerprint(),
            Module::Git(m) => m.fingerprint(),
            Module::Tarball(m) => m.fingerprint(),
        }
    }

    /// Per-module override of the environment's modules folder.
    pub fn install_path(&self) -> Option<&str> {
        match self {
            Module::Forge(_) => None,
            Module::Git(m) => m.install_path(),
            Module::Tarball(m) => m.install_path(),
        }
    }

    pub fn is_up_to_date(&self, target: &Path) -> bool {
        match self {
            Module::Forge(m) => m.is_up_to_date(target),
            Module::Git(m) => m.is_up_to_date(target),
            Module::Tarball(m) => m.is_up_to_date(target),
        }
    }

    /// Bring `target` up to date from the upstream, going through the
    /// cache. The caller holds this module's cache slot.
    pub fn fetch(&self, target: &Path, cache: &Cache) -> Result<(), FetchError> {
        match self {
            Module::Forge(m) => m.fetch(target, cache),
            Module::Git(m) => m.fetch(target, cache),
            Module::Tarball(m) => m.fetch(target, cache),
        }
    }

    pub fn short_name(&self) -> &str {
        short_name(self.name())
    }
}

/// `puppetlabs/puppetlabs-apache` and `puppetlabs-apache` both install
/// into a folder called `apache`.
pub fn short_name(name: &str) -> &str {
    name.rsplit(['/', '-']).next().unwrap_or(name)
}

pub(crate) fn fingerprint_of(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub(crate) fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(30))
        .build()
}

/// Stream a URL into a cache file. Partial files are removed so a
/// truncated download never poisons the cache.
pub(crate) fn download_to(url: &str, dest: &Path) -> Result<(), FetchError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| FetchError::filesystem(parent, e, true))?;
    }

    let response = http_agent()
        .get(url)
        .call()
        .map_err(|e| FetchError::transport(format!("failed retrieving {}: {}", url, e)))?;

    let mut reader = response.into_reader();
    let mut out =
        fs::File::create(dest).map_err(|e| FetchError::filesystem(dest, e, true))?;
    if let Err(e) = std::io::copy(&mut reader, &mut out) {
        let _ = fs::remove_file(dest);
        return Err(FetchError::artifact(format!("truncated download from {}: {}", url, e)));
    }
    Ok(())
}

/// Record the installed version inside the target folder. This marker is
/// the sole freshness signal for forge and tarball modules.
pub(crate) fn write_version_marker(target: &Path, version: &str) -> Result<(), FetchError> {
    let path = target.join(".version");
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }
    // The artifact is already extracted at this point, so failing here is
    // not worth a retry.
    let mut file = options.open(&path).map_err(|e| FetchError::filesystem(&path, e, false))?;
    file.write_all(version.as_bytes())
        .map_err(|e| FetchError::filesystem(&path, e, false))
}

pub(crate) fn version_marker_matches(target: &Path, want: &str) -> bool {
    match fs::read_to_string(target.join(".version")) {
        Ok(recorded) => recorded == want,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_name_takes_the_last_segment() {
        assert_eq!(short_name("puppetlabs/puppetlabs-apache"), "apache");
        assert_eq!(short_name("puppetlabs-apache"), "apache");
        assert_eq!(short_name("apache"), "apache");
        assert_eq!(short_name("ns/ns-foo"), "foo");
    }

    #[test]
    fn fingerprints_are_stable_and_distinct() {
        assert_eq!(fingerprint_of("puppetlabs-ntp"), fingerprint_of("puppetlabs-ntp"));
        assert_ne!(fingerprint_of("puppetlabs-ntp"), fingerprint_of("puppetlabs-apache"));
    }

    #[test]
    fn version_marker_round_trip() {
        let tmp = tempfile::tempdir().expect("tmp");
        write_version_marker(tmp.path(), "1.2.3").expect("write");
        assert!(version_marker_matches(tmp.path(), "1.2.3"));
        assert!(!version_marker_matches(tmp.path(), "1.2.4"));

        // Re-writing truncates rather than appends.
        write_version_marker(tmp.path(), "2.0").expect("rewrite");
        assert!(version_marker_matches(tmp.path(), "2.0"));
    }
}
