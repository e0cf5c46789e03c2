//! Materialize environment branches into working trees.
//!
//! Each configured source keeps one clone under the cache root; every
//! deployed environment is a worktree of that clone, named after its
//! branch, under the source's basedir.

use std::fs;

use crate::cache::Cache;
use crate::config::Config;
use crate::environment::{Environment, Source};
use crate::error::DeployError;
use crate::git;
use crate::puppetfile::PuppetFile;

/// Find the source carrying `branch`, refresh its clone and add the
/// branch worktree under the source basedir. Returns the Puppetfile that
/// drives the environment.
///
/// Sources are probed in name order, so when several sources carry a
/// branch with the same name the first one alphabetically wins every
/// time.
pub fn prepare_environment(
    config: &Config,
    cache: &Cache,
    branch: &str,
    moduledir: &str,
) -> Result<PuppetFile, DeployError> {
    let (name, source) = config
        .sources
        .iter()
        .find(|(_, source)| git::repo_has_branch(&source.remote, branch))
        .ok_or_else(|| DeployError::NoSuchEnvironment(branch.to_string()))?;

    let clone = cache.root().join(name);
    if git::is_repository(&clone) {
        git::fetch(&clone)?;
    } else {
        git::clone_branch(&source.remote, branch, &clone)?;
    }

    let worktree = source.basedir.join(branch);
    if !worktree.exists() {
        git::worktree_add(&clone, Some(&git::Ref::Branch(branch.to_string())), &worktree)?;
    }

    let puppetfile = worktree.join("Puppetfile");
    if !puppetfile.is_file() {
        return Err(DeployError::MissingPuppetfile(puppetfile));
    }

    let mut env = Environment::new(source.clone(), branch);
    env.modules_folder = moduledir.to_string();
    Ok(PuppetFile::new(puppetfile, env))
}

/// Environments already materialized under a source's basedir.
pub fn deployed_environments(source: &Source) -> Result<Vec<String>, DeployError> {
    let read_dir = fs::read_dir(&source.basedir).map_err(|e| DeployError::Basedir {
        path: source.basedir.clone(),
        source: e,
    })?;

    let mut branches = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| DeployError::Basedir {
            path: source.basedir.clone(),
            source: e,
        })?;
        if is_dir(&entry) {
            branches.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    branches.sort();
    Ok(branches)
}

fn is_dir(entry: &fs::DirEntry) -> bool {
    entry
        .file_type()
        .map(|t| t.is_dir())
        .unwrap_or(false)
}

/// The Puppetfiles of every deployed environment of every source. Used
/// by `deploy module`, which re-drives them restricted to the named
/// modules.
pub fn deployed_puppet_files(config: &Config) -> Result<Vec<PuppetFile>, DeployError> {
    let mut files = Vec::new();
    for source in config.sources.values() {
        for branch in deployed_environments(source)? {
            let puppetfile = source.basedir.join(&branch).join("Puppetfile");
            if !puppetfile.is_file() {
                continue;
            }
            files.push(PuppetFile::new(puppetfile, Environment::new(source.clone(), branch)));
        }
    }
    Ok(files)
}
