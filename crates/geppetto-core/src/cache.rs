//! Content-addressed artifact cache shared by every fetcher.
//!
//! Each module maps to one slot under the cache root, keyed by its
//! fingerprint. The slot doubles as the unit of mutual exclusion: workers
//! racing on the same fingerprint serialize, everything else runs in
//! parallel.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub struct Cache {
    root: PathBuf,
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Cache {
    /// Open the cache, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new().recursive(true).mode(0o775).create(&root)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(&root)?;

        Ok(Self { root, slots: Mutex::new(HashMap::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk folder backing a fingerprint. Not created here; fetchers
    /// populate it lazily.
    pub fn entry(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint)
    }

    pub fn has(&self, fingerprint: &str) -> bool {
        self.entry(fingerprint).exists()
    }

    /// Per-fingerprint exclusion handle. The global map lock is held only
    /// for the lookup; callers block on the returned slot after it is
    /// released, so two workers racing on a new fingerprint cannot
    /// deadlock. Entries are never removed during a run.
    pub fn slot(&self, fingerprint: &str) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(fingerprint.to_string()).or_default())
    }
}
