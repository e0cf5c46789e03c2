//! Core library for geppetto: Puppetfile parsing, module fetchers, the
//! artifact cache and the concurrent download pipeline. Used by the CLI
//! binary.

pub mod cache;
pub mod config;
pub mod deploy;
pub mod environment;
pub mod error;
pub mod extract;
pub mod git;
pub mod metadata;
pub mod module;
pub mod parser;
pub mod pipeline;
pub mod puppetfile;
pub mod settings;
pub mod ux;

// Re-export the main API for the CLI.
pub use cache::Cache;
pub use config::Config;
pub use environment::{Environment, Source};
pub use error::{ConfigError, DeployError, FetchError, ManifestError};
pub use module::{ForgeModule, GitModule, Module, TarballModule};
pub use pipeline::install_puppet_files;
pub use puppetfile::PuppetFile;
pub use settings::Settings;
