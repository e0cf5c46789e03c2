//! GitHub tagged-tarball fetcher. Same lifecycle as the forge fetcher,
//! with the tag listing standing in for the release listing.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::cache::Cache;
use crate::error::FetchError;
use crate::extract;

use super::{download_to, fingerprint_of, http_agent, version_marker_matches, write_version_marker};

pub const DEFAULT_TARBALL_API_URL: &str = "https://api.github.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballModule {
    name: String,
    repo_slug: String,
    version: Option<String>,
    install_path: Option<String>,
}

/// One entry of `/repos/<slug>/tags`, newest first.
#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
    tarball_url: String,
}

impl TarballModule {
    pub fn new(
        name: impl Into<String>,
        repo_slug: impl Into<String>,
        version: Option<String>,
        install_path: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            repo_slug: repo_slug.into(),
            version: version.filter(|v| !v.is_empty()),
            install_path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repo_slug(&self) -> &str {
        &self.repo_slug
    }

    pub fn install_path(&self) -> Option<&str> {
        self.install_path.as_deref()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.name)
    }

    pub fn is_up_to_date(&self, target: &Path) -> bool {
        if !target.exists() {
            return false;
        }
        match &self.version {
            None => true,
            Some(want) => version_marker_matches(target, want),
        }
    }

    fn tag_listing(&self) -> Result<Vec<Tag>, FetchError> {
        let url = format!("{}/repos/{}/tags", DEFAULT_TARBALL_API_URL, self.repo_slug);
        let response = http_agent()
            .get(&url)
            .call()
            .map_err(|e| FetchError::transport(format!("failed retrieving {}: {}", url, e)))?;
        response
            .into_json::<Vec<Tag>>()
            .map_err(|e| FetchError::transport(format!("bad tag listing for {}: {}", self.repo_slug, e)))
    }

    pub fn fetch(&self, target: &Path, cache: &Cache) -> Result<(), FetchError> {
        let tags = self.tag_listing()?;
        let tag = select_tag(&tags, self.version.as_deref(), &self.name)?;

        let archive = cache
            .entry(&self.fingerprint())
            .join(format!("{}.tar.gz", tag.name));
        if !archive.exists() {
            download_to(&tag.tarball_url, &archive)?;
        }

        let reader = File::open(&archive).map_err(|e| FetchError::filesystem(&archive, e, true))?;
        extract::extract_stripped(reader, target)?;
        write_version_marker(target, &tag.name)
    }
}

fn select_tag<'a>(tags: &'a [Tag], want: Option<&str>, name: &str) -> Result<&'a Tag, FetchError> {
    if tags.is_empty() {
        return Err(FetchError::not_found(format!("could not find module {}", name)));
    }
    match want {
        None => Ok(&tags[0]),
        Some(version) => tags.iter().find(|t| t.name == version).ok_or_else(|| {
            FetchError::not_found(format!("could not find version {} for module {}", version, name))
        }),
    }
}
