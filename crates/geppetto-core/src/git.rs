//! Thin wrapper over the git command line. Every repository operation
//! runs as a subprocess, the same commands an operator would type.

use std::path::Path;
use std::process::Command;

use crate::error::FetchError;

/// What a git module should be checked out at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Commit(String),
    Branch(String),
    Tag(String),
}

impl Ref {
    /// Argument handed to `git worktree add`: branches materialize from
    /// their remote-tracking ref, tags and commits are literal.
    pub fn checkout_target(&self) -> String {
        match self {
            Ref::Branch(branch) => format!("origin/{}", branch),
            Ref::Tag(tag) => tag.clone(),
            Ref::Commit(commit) => commit.clone(),
        }
    }
}

fn run(command: &mut Command) -> Result<(), FetchError> {
    let output = command
        .output()
        .map_err(|e| FetchError::transport(format!("failed running git: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::transport(format!(
            "git exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// True when `dir` is inside a git repository.
pub fn is_repository(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

pub fn clone(remote: &str, to: &Path) -> Result<(), FetchError> {
    run(Command::new("git").arg("clone").arg(remote).arg(to))
}

/// Clone with a specific branch checked out.
pub fn clone_branch(remote: &str, branch: &str, to: &Path) -> Result<(), FetchError> {
    run(Command::new("git").args(["clone", "-b", branch]).arg(remote).arg(to))
}

pub fn fetch(repo: &Path) -> Result<(), FetchError> {
    run(Command::new("git").arg("fetch").current_dir(repo))
}

/// Probe a remote for a branch without cloning it.
pub fn repo_has_branch(remote: &str, branch: &str) -> bool {
    Command::new("git")
        .args(["ls-remote", "--exit-code", "-h", remote, branch])
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Add a detached worktree rooted at `repo`, checked out at `want` (HEAD
/// when no ref is requested).
pub fn worktree_add(repo: &Path, want: Option<&Ref>, to: &Path) -> Result<(), FetchError> {
    let to = std::path::absolute(to)
        .map_err(|e| FetchError::filesystem(to, e, false))?;

    let mut command = Command::new("git");
    command.args(["worktree", "add", "--detach", "-f"]).arg(&to);
    if let Some(want) = want {
        command.arg(want.checkout_target());
    }
    command.current_dir(repo);
    run(&mut command)
}

/// Decoration of the current HEAD (`git show -s --pretty=%d HEAD`), e.g.
/// ` (HEAD, origin/main, tag: v1.2.0)`. None when `dir` is not a worktree.
pub fn head_decoration(dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .args(["show", "-s", "--pretty=%d", "HEAD"])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}
