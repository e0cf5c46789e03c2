//! Puppet Forge registry fetcher.
//!
//! Release listings come from the registry's `/v3/releases` endpoint,
//! newest first. Archives are cached per fingerprint and version, so a
//! re-run with an unchanged version never touches the network.

use std::fs::File;
use std::path::Path;

use serde::Deserialize;

use crate::cache::Cache;
use crate::error::FetchError;
use crate::extract;

use super::{download_to, fingerprint_of, http_agent, version_marker_matches, write_version_marker};

pub const DEFAULT_FORGE_URL: &str = "https://forgeapi.puppetlabs.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeModule {
    name: String,
    version: Option<String>,
    forge_url: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseList {
    results: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    file_uri: String,
    version: String,
}

impl ForgeModule {
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version: version.filter(|v| !v.is_empty()),
            forge_url: DEFAULT_FORGE_URL.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Registry base URL, settable from the Puppetfile's `forge` option.
    pub fn set_forge_url(&mut self, url: &str) {
        self.forge_url = url.trim_end_matches('/').to_string();
    }

    pub fn forge_url(&self) -> &str {
        &self.forge_url
    }

    pub fn fingerprint(&self) -> String {
        fingerprint_of(&self.name)
    }

    /// Fresh when the folder exists and, if a version was requested, the
    /// `.version` marker records exactly that version.
    pub fn is_up_to_date(&self, target: &Path) -> bool {
        if !target.exists() {
            return false;
        }
        match &self.version {
            None => true,
            Some(want) => version_marker_matches(target, want),
        }
    }

    fn release_listing(&self) -> Result<ReleaseList, FetchError> {
        let url = format!(
            "{}/v3/releases?module={}&sort_by=release_date&limit=100",
            self.forge_url.trim_end_matches('/'),
            self.name
        );
        let response = http_agent()
            .get(&url)
            .call()
            .map_err(|e| FetchError::transport(format!("failed retrieving {}: {}", url, e)))?;
        response
            .into_json::<ReleaseList>()
            .map_err(|e| FetchError::transport(format!("bad release listing for {}: {}", self.name, e)))
    }

    pub fn fetch(&self, target: &Path, cache: &Cache) -> Result<(), FetchError> {
        let listing = self.release_listing()?;
        let release = select_release(&listing.results, self.version.as_deref(), &self.name)?;

        let archive = cache
            .entry(&self.fingerprint())
            .join(format!("{}.tar.gz", release.version));
        if !archive.exists() {
            let url = format!("{}{}", self.forge_url.trim_end_matches('/'), release.file_uri);
            download_to(&url, &archive)?;
        }

        let reader = File::open(&archive).map_err(|e| FetchError::filesystem(&archive, e, true))?;
        extract::extract_stripped(reader, target)?;
        write_version_marker(target, &release.version)
    }
}

/// Exact match when a version was requested, newest release otherwise.
fn select_release<'a>(
    results: &'a [Release],
    want: Option<&str>,
    name: &str,
) -> Result<&'a Release, FetchError> {
    if results.is_empty() {
        return Err(FetchError::not_found(format!("could not find module {}", name)));
    }
    match want {
        None => Ok(&results[0]),
        Some(version) => results.iter().find(|r| r.version == version).ok_or_else(|| {
            FetchError::not_found(format!("could not find version {} for module {}", version, name))
        }),
    }
}
