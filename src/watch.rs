//! File watcher: resolves once on startup, then invalidates and re-resolves
//! whenever a file in the reference graph changes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use notify::{RecursiveMode, Watcher as _};

use crate::cache::SchemaCache;
use crate::commands::{self, OutputOptions};
use crate::config::Config;
use crate::diagnostics;
use crate::error;
use crate::hasher::hash_path;
use crate::reference::normalize_path;
use crate::resolver::{Resolver, Session};
use crate::types::FileHash;

/// Debounce delay between filesystem events and re-resolution.
const DEBOUNCE_MS: u64 = 100;

/// Parent directories of every cached document plus every file that failed,
/// so that fixing a broken file also triggers re-resolution.
fn collect_watch_dirs(cache: &SchemaCache, session: &Session) -> HashSet<PathBuf> {
    let failed = session.failed.iter().map(|(path, _)| return path.as_path());
    return cache
        .source_paths()
        .chain(failed)
        .filter_map(Path::parent)
        .map(Path::to_path_buf)
        .collect();
}

/// Create a filesystem watcher that sends changed paths on the given channel.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be created.
fn create_watcher(
    tx: crossbeam_channel::Sender<Vec<PathBuf>>,
) -> Result<notify::RecommendedWatcher, error::Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_)
                    | notify::EventKind::Modify(_)
                    | notify::EventKind::Remove(_)
            )
        {
            let _ = tx.send(event.paths);
        }
    })
    .map_err(|e| {
        return error::Error::WatchFailed {
            reason: format!("watcher setup failed: {e}"),
        };
    });
}

/// Drop flagged entries whose source file no longer exists, so dependents
/// stop splicing in content from a deleted file. Returns how many were dropped.
fn evict_removed(cache: &mut SchemaCache, flagged: &[FileHash]) -> usize {
    let mut evicted = 0_usize;
    for hash in flagged {
        let removed = cache.get(hash).is_some_and(|entry| return !entry.source_path.exists());
        if removed && let Some(entry) = cache.delete(hash) {
            tracing::info!(file = %entry.source_path.display(), "evicted removed document");
            evicted = evicted.saturating_add(1);
        }
    }
    return evicted;
}

/// Flag every cache entry affected by a batch of changed paths.
/// Returns the flagged hashes, deduplicated.
pub fn invalidate_changed(cache: &mut SchemaCache, paths: &[PathBuf]) -> Vec<FileHash> {
    let mut flagged: Vec<FileHash> = Vec::new();
    for path in paths {
        for hash in cache.invalidate(&hash_path(&normalize_path(path))) {
            if !flagged.contains(&hash) {
                flagged.push(hash);
            }
        }
    }
    return flagged;
}

/// Resolve and write, reporting rather than propagating write errors so the
/// loop keeps running while the user fixes their files.
fn resolve_and_write(cache: &mut SchemaCache, resolver: &mut Resolver, output: &OutputOptions) {
    let handle = resolver.parse(cache);
    if cache.is_empty() {
        tracing::warn!("no document of the graph could be resolved");
    }
    tracing::info!(cached = cache.len(), "resolution finished");
    match commands::write_resolved(cache, resolver, output) {
        Err(e) => diagnostics::print_error(&e),
        Ok(()) => eprintln!("watch: {} is up to date", handle.url_path()),
    }
    return;
}

/// Entry point for the watch command.
///
/// Resolves `entry`, then watches every directory containing a file of the
/// graph. Each batch of changes invalidates the affected entries (lazily,
/// by flag) and re-runs resolution.
///
/// # Errors
///
/// Returns errors from resolver construction or watcher setup.
pub fn run(entry: &Path, config: &Config, output: &OutputOptions) -> Result<ExitCode, error::Error> {
    let mut cache = SchemaCache::new();
    let mut resolver = Resolver::new(entry, config.rewrite_rules.clone())?;

    eprintln!("watch: initial resolve");
    resolve_and_write(&mut cache, &mut resolver, output);

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    let mut watched: HashSet<PathBuf> = HashSet::new();
    watch_new_dirs(&mut watcher, &mut watched, collect_watch_dirs(&cache, resolver.session()));

    let dir_count = watched.len();
    eprintln!("watch: monitoring {dir_count} directories, press Ctrl+C to stop");

    while let Ok(mut changed) = rx.recv() {
        let debounce = Duration::from_millis(DEBOUNCE_MS);
        while let Ok(more) = rx.recv_timeout(debounce) {
            changed.extend(more);
        }

        let flagged = invalidate_changed(&mut cache, &changed);
        if flagged.is_empty() && cache.has(&resolver.handle().hash) {
            continue;
        }
        let evicted = evict_removed(&mut cache, &flagged);
        tracing::info!(stale = flagged.len(), evicted, "change detected");
        eprintln!("watch: change detected, re-resolving...");
        resolve_and_write(&mut cache, &mut resolver, output);
        watch_new_dirs(&mut watcher, &mut watched, collect_watch_dirs(&cache, resolver.session()));
    }

    return Ok(ExitCode::SUCCESS);
}

/// Start watching directories not already watched.
fn watch_new_dirs(
    watcher: &mut notify::RecommendedWatcher,
    watched: &mut HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
) {
    for dir in dirs {
        if watched.contains(&dir) || !dir.exists() {
            continue;
        }
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot watch directory");
            continue;
        }
        watched.insert(dir);
    }
    return;
}

#[cfg(all(test, not(windows)))]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::CacheEntry;

    fn cached(cache: &mut SchemaCache, path: &str, dependencies: &[&str]) -> FileHash {
        let hash = hash_path(Path::new(path));
        cache.set(hash.clone(), CacheEntry {
            dependencies: dependencies.iter().map(|d| return hash_path(Path::new(d))).collect(),
            must_revalidate: false,
            schema: json!({}),
            source_path: PathBuf::from(path),
        });
        return hash;
    }

    #[test]
    fn changed_paths_flag_entries_and_dependents() {
        let mut cache = SchemaCache::new();
        let root = cached(&mut cache, "/specs/api.yaml", &["/specs/shared/models.yaml"]);
        let models = cached(&mut cache, "/specs/shared/models.yaml", &[]);
        let other = cached(&mut cache, "/specs/other.yaml", &[]);

        let flagged = invalidate_changed(&mut cache, &[
            PathBuf::from("/specs/shared/./models.yaml"),
            PathBuf::from("/specs/shared/models.yaml"),
            PathBuf::from("/specs/unrelated.txt"),
        ]);

        assert_eq!(flagged, vec![models, root.clone()]);
        assert!(cache.must_revalidate(&root));
        assert!(!cache.must_revalidate(&other));
    }

    #[test]
    fn removed_sources_are_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.yaml");
        std::fs::write(&kept, "a: 1\n").unwrap();
        let gone = dir.path().join("gone.yaml");

        let mut cache = SchemaCache::new();
        let kept_hash = cached(&mut cache, kept.to_str().unwrap(), &[]);
        let gone_hash = cached(&mut cache, gone.to_str().unwrap(), &[]);

        assert_eq!(evict_removed(&mut cache, &[kept_hash.clone(), gone_hash.clone()]), 1);
        assert!(cache.has(&kept_hash));
        assert!(!cache.has(&gone_hash));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn watches_dirs_of_cached_and_failed_files() {
        let mut cache = SchemaCache::new();
        cached(&mut cache, "/specs/api.yaml", &[]);
        cached(&mut cache, "/specs/shared/models.yaml", &[]);
        let session = Session {
            failed: vec![(PathBuf::from("/vendor/broken.yaml"), "parse failed".to_string())],
            parsed: Vec::new(),
        };

        let dirs = collect_watch_dirs(&cache, &session);

        let expected: HashSet<PathBuf> = ["/specs", "/specs/shared", "/vendor"].iter().map(PathBuf::from).collect();
        assert_eq!(dirs, expected);
    }
}
