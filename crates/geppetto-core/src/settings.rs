//! Typed knobs handed over by the CLI. The core never sees a
//! string-keyed option map.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Manifest to drive in install/check mode.
    pub puppetfile: Option<PathBuf>,
    /// Default modules folder, before any Puppetfile `moduledir` override.
    pub moduledir: Option<String>,
    /// Environments named on a `deploy environment` invocation.
    pub environments: Vec<String>,
    /// Modules named on a `deploy module` invocation; when non-empty the
    /// drivers skip everything else.
    pub modules: Vec<String>,
    pub workers: usize,
    pub follow_deps: bool,
    pub max_tries: usize,
    pub retry_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            puppetfile: None,
            moduledir: None,
            environments: Vec::new(),
            modules: Vec::new(),
            workers: 4,
            follow_deps: true,
            max_tries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}
