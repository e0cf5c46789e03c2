//! Where modules land: an environment is one branch of a source,
//! checked out under the source's basedir.

use std::path::PathBuf;

use serde::Deserialize;

/// One entry under `sources:` in r10k.yml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Source {
    pub basedir: PathBuf,
    pub prefix: Option<String>,
    pub remote: String,
}

pub const DEFAULT_MODULES_FOLDER: &str = "modules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub source: Source,
    pub branch: String,
    pub modules_folder: String,
}

impl Environment {
    pub fn new(source: Source, branch: impl Into<String>) -> Self {
        Self {
            source,
            branch: branch.into(),
            modules_folder: DEFAULT_MODULES_FOLDER.to_string(),
        }
    }

    /// Root of the working tree: `<basedir>/<branch>`, or the basedir
    /// itself in the single-manifest install mode where the branch is
    /// empty.
    pub fn root(&self) -> PathBuf {
        if self.branch.is_empty() {
            self.source.basedir.clone()
        } else {
            self.source.basedir.join(&self.branch)
        }
    }
}
