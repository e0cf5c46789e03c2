//! The concurrent download pipeline.
//!
//! A single unbounded request channel feeds a fixed pool of worker
//! threads. Workers fetch modules and, once a module is in place, read
//! its metadata.json and feed the declared dependencies back into the
//! same channel. Every request carries a completion signal, a clone of
//! the request sender for follow-ups and a WaitGroup guard; the channel
//! drains and disconnects once the WaitGroup does.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::sync::WaitGroup;

use crate::cache::Cache;
use crate::environment::{Environment, DEFAULT_MODULES_FOLDER};
use crate::error::{FetchError, ManifestError};
use crate::metadata;
use crate::module::{ForgeModule, Module};
use crate::puppetfile::{LoadedManifest, PuppetFile};
use crate::settings::Settings;
use crate::ux;

/// One unit of work for the pool.
struct DownloadRequest {
    module: Module,
    env: Environment,
    /// Completion signal for whoever emitted this request.
    done: Sender<()>,
    /// Where discovered dependencies go: back into the pool.
    requests: Sender<DownloadRequest>,
    /// Held until the request is fully processed, dependencies included.
    wg: WaitGroup,
}

/// Drive a set of Puppetfiles to completion and return the number of
/// modules that failed after retries. Manifest errors are fatal and
/// reported before any download starts.
pub fn install_puppet_files(
    puppet_files: &[PuppetFile],
    cache: Arc<Cache>,
    settings: &Settings,
) -> Result<usize, ManifestError> {
    let mut manifests = Vec::with_capacity(puppet_files.len());
    for puppet_file in puppet_files {
        manifests.push(puppet_file.load()?);
    }

    let (requests_tx, requests_rx) = unbounded::<DownloadRequest>();
    let wg = WaitGroup::new();

    let mut workers = Vec::with_capacity(settings.workers.max(1));
    for _ in 0..settings.workers.max(1) {
        let rx = requests_rx.clone();
        let cache = Arc::clone(&cache);
        let settings = settings.clone();
        workers.push(thread::spawn(move || download_modules(rx, cache, settings)));
    }
    drop(requests_rx);

    // Emit every manifest's requests in manifest order, then wait for
    // each of them to complete.
    let (done_tx, done_rx) = unbounded::<()>();
    let mut emitted = 0;
    for manifest in &manifests {
        emitted += emit_requests(manifest, &settings.modules, &requests_tx, &done_tx, &wg);
    }
    drop(done_tx);
    drop(requests_tx);

    for _ in 0..emitted {
        if done_rx.recv().is_err() {
            break;
        }
    }

    // Dependency emitters may still be running; the WaitGroup covers
    // them and every request they produced.
    wg.wait();

    let mut errors = 0;
    for worker in workers {
        match worker.join() {
            Ok(count) => errors += count,
            Err(_) => {
                ux::log_error("a download worker panicked");
                errors += 1;
            }
        }
    }
    Ok(errors)
}

/// Emit one request per module of a loaded manifest. Modules matching
/// neither their full nor their short name against a non-empty limit
/// list are skipped.
fn emit_requests(
    manifest: &LoadedManifest,
    limit_to_modules: &[String],
    requests: &Sender<DownloadRequest>,
    done: &Sender<()>,
    wg: &WaitGroup,
) -> usize {
    let mut emitted = 0;
    for module in &manifest.modules {
        if !limit_to_modules.is_empty()
            && !limit_to_modules
                .iter()
                .any(|name| name == module.name() || name == module.short_name())
        {
            continue;
        }
        let request = DownloadRequest {
            module: module.clone(),
            env: manifest.env.clone(),
            done: done.clone(),
            requests: requests.clone(),
            wg: wg.clone(),
        };
        if requests.send(request).is_err() {
            break;
        }
        emitted += 1;
    }
    emitted
}

/// Worker loop: drain the channel until every sender is gone, then
/// report how many modules ended in failure.
fn download_modules(
    requests: Receiver<DownloadRequest>,
    cache: Arc<Cache>,
    settings: Settings,
) -> usize {
    let mut errors = 0;
    for request in requests.iter() {
        if !process_request(request, &cache, &settings) {
            errors += 1;
        }
    }
    errors
}

/// Handle one request end to end. Returns false when the module failed
/// after retries.
fn process_request(request: DownloadRequest, cache: &Cache, settings: &Settings) -> bool {
    let DownloadRequest { module, env, done, requests, wg } = request;

    let target = target_folder(&module, &env);
    let outcome = {
        let slot = cache.slot(&module.fingerprint());
        let _lock = slot.lock().unwrap_or_else(|e| e.into_inner());
        fetch_with_retry(&module, &target, cache, settings)
    };

    let ok = match outcome {
        Ok(skipped) => {
            // Dependencies are followed even for skipped modules: an
            // up-to-date module may still be missing dependencies from
            // an earlier --no-deps run.
            if settings.follow_deps {
                enqueue_dependencies(&target, &env, &requests, &wg);
            }
            if !skipped {
                ux::log(&format!("Downloaded {} to {}", module.name(), target.display()));
            }
            true
        }
        Err(err) => {
            ux::log_error(&format!(
                "failed downloading {} to {}: {}. Giving up!",
                module.name(),
                target.display(),
                err
            ));
            false
        }
    };

    let _ = done.send(());
    ok
}

/// Absolute target folder for a module: the environment root joined with
/// the effective modules folder (or the module's own install_path) and
/// the module's short name.
fn target_folder(module: &Module, env: &Environment) -> PathBuf {
    let root = env.root();
    let base = match module.install_path() {
        Some(install_path) => root.join(install_path),
        None => {
            let folder = if env.modules_folder.is_empty() {
                DEFAULT_MODULES_FOLDER
            } else {
                env.modules_folder.as_str()
            };
            let folder = Path::new(folder);
            if folder.is_absolute() {
                folder.to_path_buf()
            } else {
                root.join(folder)
            }
        }
    };
    base.join(module.short_name())
}

/// Freshness check, then fetch with the configured retry policy. Returns
/// Ok(true) when the target was already up to date.
fn fetch_with_retry(
    module: &Module,
    target: &Path,
    cache: &Cache,
    settings: &Settings,
) -> Result<bool, FetchError> {
    if module.is_up_to_date(target) {
        return Ok(true);
    }

    let max_tries = settings.max_tries.max(1);
    let mut tries = 0;
    loop {
        tries += 1;
        match wipe_and_fetch(module, target, cache) {
            Ok(()) => return Ok(false),
            Err(err) if err.retryable() && tries < max_tries => {
                ux::log_error(&format!("failed downloading {}: {}... Retrying", module.name(), err));
                thread::sleep(settings.retry_delay);
            }
            Err(err) => return Err(err),
        }
    }
}

fn wipe_and_fetch(module: &Module, target: &Path, cache: &Cache) -> Result<(), FetchError> {
    match fs::remove_dir_all(target) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(FetchError::filesystem(target, err, true)),
    }
    module.fetch(target, cache)
}

/// Feed a module's metadata.json dependencies back into the pool.
///
/// The rendezvous runs on its own thread so the worker never waits on
/// the pool while other workers may be waiting on its fingerprint; the
/// WaitGroup guard keeps the pipeline alive until the emitter and all of
/// its requests have finished.
fn enqueue_dependencies(
    target: &Path,
    env: &Environment,
    requests: &Sender<DownloadRequest>,
    wg: &WaitGroup,
) {
    let metadata_path = target.join("metadata.json");
    if !metadata_path.exists() {
        return;
    }

    let env = env.clone();
    let requests = requests.clone();
    let wg = wg.clone();
    thread::spawn(move || {
        let metadata = match metadata::read(&metadata_path) {
            Ok(metadata) => metadata,
            Err(err) => {
                ux::log_error(&format!("failed parsing {}: {}", metadata_path.display(), err));
                return;
            }
        };

        let (done_tx, done_rx) = unbounded::<()>();
        let mut emitted = 0;
        for dependency in metadata.dependencies {
            let request = DownloadRequest {
                module: Module::Forge(ForgeModule::new(dependency.name, None)),
                env: env.clone(),
                done: done_tx.clone(),
                requests: requests.clone(),
                wg: wg.clone(),
            };
            if requests.send(request).is_err() {
                break;
            }
            emitted += 1;
        }
        drop(done_tx);
        drop(requests);

        for _ in 0..emitted {
            if done_rx.recv().is_err() {
                break;
            }
        }
        drop(wg);
    });
}
