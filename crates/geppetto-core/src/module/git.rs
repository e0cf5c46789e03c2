//! Git module fetcher. The cache holds a full clone per remote; targets
//! are detached worktrees sharing that clone's objects.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::error::FetchError;
use crate::git::{self, Ref};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitModule {
    name: String,
    remote_url: String,
    install_path: Option<String>,
    want: Option<Ref>,
}

impl GitModule {
    pub fn new(
        name: impl Into<String>,
        remote_url: impl Into<String>,
        install_path: Option<String>,
        want: Option<Ref>,
    ) -> Self {
        Self {
            name: name.into(),
            remote_url: remote_url.into(),
            install_path,
            want,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn install_path(&self) -> Option<&str> {
        self.install_path.as_deref()
    }

    pub fn want(&self) -> Option<&Ref> {
        self.want.as_ref()
    }

    /// Keyed by the remote URL: two modules tracking the same repository
    /// share a clone no matter what they are called.
    pub fn fingerprint(&self) -> String {
        super::fingerprint_of(&self.remote_url)
    }

    /// Git modules have no `.version` marker; freshness is read straight
    /// from the worktree's HEAD decoration.
    pub fn is_up_to_date(&self, target: &Path) -> bool {
        if !target.exists() {
            return false;
        }
        let Some(want) = &self.want else {
            return true;
        };
        let Some(decoration) = git::head_decoration(target) else {
            return false;
        };
        ref_matches(&decoration, want, || current_commit(target))
    }

    fn update_cache(&self, repo: &Path) -> Result<(), FetchError> {
        if repo.exists() {
            if repo.join(".git").exists() {
                return git::fetch(repo);
            }
            // Present but not a repository: wipe it and clone from scratch.
            fs::remove_dir_all(repo).map_err(|e| FetchError::filesystem(repo, e, true))?;
        }
        git::clone(&self.remote_url, repo)
    }

    pub fn fetch(&self, target: &Path, cache: &Cache) -> Result<(), FetchError> {
        let repo = cache.entry(&self.fingerprint());
        self.update_cache(&repo)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::filesystem(parent, e, true))?;
        }
        git::worktree_add(&repo, self.want.as_ref(), target)
    }
}

/// Decide freshness from the HEAD decoration. A `:ref` can name a
/// branch, a tag or a commit, so it matches any of the three spellings;
/// the HEAD comparison is lazy because reading it costs two file reads
/// we rarely need.
fn ref_matches<F>(decoration: &str, want: &Ref, head: F) -> bool
where
    F: FnOnce() -> Option<String>,
{
    match want {
        Ref::Branch(branch) => decoration.contains(&format!("origin/{}", branch)),
        Ref::Tag(tag) => decoration.contains(&format!("tag: {}", tag)),
        Ref::Commit(commit) => {
            decoration.contains(&format!("origin/{}", commit))
                || decoration.contains(&format!("tag: {}", commit))
                || head().is_some_and(|h| h == *commit)
        }
    }
}

/// HEAD of a worktree, read through the `.git` file's gitdir pointer.
fn current_commit(folder: &Path) -> Option<String> {
    let pointer = fs::read_to_string(folder.join(".git")).ok()?;
    let gitdir = pointer
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))
        .map(str::trim)?;
    let gitdir = if Path::new(gitdir).is_absolute() {
        PathBuf::from(gitdir)
    } else {
        folder.join(gitdir)
    };
    let head = fs::read_to_string(gitdir.join("HEAD")).ok()?;
    head.lines().next().map(|line| line.trim().to_string())
}
