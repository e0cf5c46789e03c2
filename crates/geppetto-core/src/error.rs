//! Error types shared across the crate.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure classes for a single module fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// HTTP non-2xx, socket failure, or a git subprocess exiting nonzero.
    Transport,
    /// Archive is not valid gzip/tar, or the download was truncated.
    Artifact,
    /// Module or requested version absent upstream.
    NotFound,
    /// Local filesystem trouble.
    Filesystem,
}

/// Why a module fetch failed, and whether another attempt could help.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    kind: FetchErrorKind,
    retryable: bool,
    message: String,
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Transport, retryable: true, message: message.into() }
    }

    pub fn artifact(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::Artifact, retryable: true, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { kind: FetchErrorKind::NotFound, retryable: false, message: message.into() }
    }

    pub fn filesystem(path: &Path, source: io::Error, retryable: bool) -> Self {
        Self {
            kind: FetchErrorKind::Filesystem,
            retryable,
            message: format!("{}: {}", path.display(), source),
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }
}

/// Puppetfile grammar violation. Fatal to the run that parsed it.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed Puppetfile, {reason} around line {line}")]
pub struct MalformedManifest {
    pub line: usize,
    pub reason: String,
}

/// Opening or parsing a Puppetfile failed.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("could not open {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {}", .path.display(), .source)]
    Malformed {
        path: PathBuf,
        #[source]
        source: MalformedManifest,
    },
}

/// metadata.json could not be read. Logged and skipped, never fatal.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("could not read JSON file: {0}")]
    Io(#[from] io::Error),
    #[error("JSON file malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// r10k.yml could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {}: {}", .path.display(), .source)]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Materializing an environment branch failed. Fatal for the deploy run.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no configured source has a branch named {0}")]
    NoSuchEnvironment(String),
    #[error("no such file or directory {}", .0.display())]
    MissingPuppetfile(PathBuf),
    #[error("failed reading environments under {}: {}", .path.display(), .source)]
    Basedir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Git(#[from] FetchError),
}
