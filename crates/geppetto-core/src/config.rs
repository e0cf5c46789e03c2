//! r10k.yml: the cache directory and the environment sources.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::environment::Source;
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "r10k.yml";
pub const DEFAULT_CACHE_DIR: &str = ".cache";

/// Sources are kept in a BTreeMap so iteration order, and therefore the
/// source picked when several carry the same branch, is stable.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cachedir: Option<String>,
    pub sources: BTreeMap<String, Source>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io { path: path.to_path_buf(), source: e })?;
        serde_yaml::from_str(&raw)
            .map_err(|e| ConfigError::Yaml { path: path.to_path_buf(), source: e })
    }

    pub fn cache_dir(&self) -> &str {
        self.cachedir.as_deref().unwrap_or(DEFAULT_CACHE_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_cachedir_and_sources() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("r10k.yml");
        fs::write(
            &path,
            "cachedir: /var/cache/geppetto\n\
             sources:\n\
             \x20 main:\n\
             \x20   basedir: /etc/puppetlabs/code/environments\n\
             \x20   remote: https://git.example.com/puppet.git\n\
             \x20 ops:\n\
             \x20   basedir: /srv/ops\n\
             \x20   prefix: ops\n\
             \x20   remote: https://git.example.com/ops.git\n",
        )
        .expect("write");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.cache_dir(), "/var/cache/geppetto");
        assert_eq!(config.sources.len(), 2);

        let main = &config.sources["main"];
        assert_eq!(main.basedir, PathBuf::from("/etc/puppetlabs/code/environments"));
        assert_eq!(main.remote, "https://git.example.com/puppet.git");
        assert_eq!(main.prefix, None);
        assert_eq!(config.sources["ops"].prefix.as_deref(), Some("ops"));

        // BTreeMap keeps name order.
        let names: Vec<_> = config.sources.keys().collect();
        assert_eq!(names, ["main", "ops"]);
    }

    #[test]
    fn cachedir_defaults_when_absent() {
        let tmp = tempfile::tempdir().expect("tmp");
        let path = tmp.path().join("r10k.yml");
        fs::write(&path, "sources: {}\n").expect("write");
        assert_eq!(Config::load(&path).expect("load").cache_dir(), DEFAULT_CACHE_DIR);
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let err = Config::load(Path::new("/nonexistent/r10k.yml")).expect_err("missing");
        assert!(err.to_string().contains("could not read"));
    }
}
