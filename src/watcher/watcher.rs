//! Filesystem watcher keeping the index in step with the tree.
//!
//! Directories are registered non-recursively, from the root down to the
//! configured depth, so the OS only reports changes where we asked for them.
//! Raw notifications are debounced per `(kind, path)` key; once a key goes
//! quiet its path is re-stat-ed and the index row is upserted, deleted, or a
//! new directory watch is added. All state lives in the event loop; the
//! service struct only holds the handle.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use super::debounce::{DebounceKey, DebounceKind, Debouncer};
use super::filter::IgnorePatterns;
use crate::error::WatcherError;
use crate::scan::record::{self, FileRecord};
use crate::storage::{self, Database};
use crate::Result;

/// Watcher tunables, fixed at construction.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Whether the watcher may run at all.
    pub enabled: bool,
    /// Directory levels below the root that get watches; -1 is unbounded.
    pub depth: i64,
    /// Quiet interval per event key.
    pub debounce: Duration,
    /// Glob-shaped ignore patterns.
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            depth: 1,
            debounce: Duration::from_millis(1000),
            ignore_patterns: vec![
                "**/.git/**".to_string(),
                "**/node_modules/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
        }
    }
}

/// Read-only snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatcherStatus {
    pub enabled: bool,
    pub active: bool,
    pub watched_directories: usize,
    pub watch_depth: i64,
}

/// Event counters, exported through the metrics endpoint.
#[derive(Debug, Default)]
pub struct WatchStats {
    pub events_seen: AtomicU64,
    pub events_handled: AtomicU64,
    pub index_upserts: AtomicU64,
    pub index_deletes: AtomicU64,
}

impl WatchStats {
    #[must_use]
    pub fn snapshot(&self) -> WatchStatsSnapshot {
        WatchStatsSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
            index_upserts: self.index_upserts.load(Ordering::Relaxed),
            index_deletes: self.index_deletes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`WatchStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchStatsSnapshot {
    pub events_seen: u64,
    pub events_handled: u64,
    pub index_upserts: u64,
    pub index_deletes: u64,
}

struct ActiveWatch {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
    watched: Arc<Mutex<HashSet<PathBuf>>>,
}

/// Watcher service. Share behind an `Arc`; start and stop from any task.
pub struct FileWatcher {
    db: Database,
    root: PathBuf,
    options: WatchOptions,
    ignore: IgnorePatterns,
    stats: Arc<WatchStats>,
    active: Mutex<Option<ActiveWatch>>,
}

impl FileWatcher {
    #[must_use]
    pub fn new(db: Database, root: PathBuf, options: WatchOptions) -> Self {
        let ignore = IgnorePatterns::new(&options.ignore_patterns);
        Self {
            db,
            root,
            options,
            ignore,
            stats: Arc::new(WatchStats::default()),
            active: Mutex::new(None),
        }
    }

    /// Start watching. No-op when disabled by configuration or already
    /// active. Must run inside a tokio runtime; initial registration walks
    /// the tree synchronously before the event loop spawns.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watcher cannot be created. Per-directory
    /// registration failures are logged and skipped.
    pub fn start(&self) -> Result<()> {
        if !self.options.enabled {
            tracing::info!("File watcher disabled by configuration");
            return Ok(());
        }

        let mut active = self.active.lock();
        if active.is_some() {
            tracing::debug!("File watcher already active");
            return Ok(());
        }

        let (raw_tx, raw_rx) = mpsc::channel(100);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        let _ = raw_tx.blocking_send(event);
                    }
                    Err(e) => tracing::error!(error = %e, "Watch backend error"),
                }
            })
            .map_err(|e| WatcherError::WatchFailed {
                path: self.root.display().to_string(),
                reason: e.to_string(),
            })?;

        let watched = Arc::new(Mutex::new(HashSet::new()));
        let registered = register_watches(
            &mut watcher,
            &self.root,
            self.options.depth,
            &self.ignore,
            &watched,
        );

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let ctx = LoopCtx {
            db: self.db.clone(),
            root: self.root.clone(),
            depth: self.options.depth,
            debounce: self.options.debounce,
            ignore: self.ignore.clone(),
            watched: Arc::clone(&watched),
            stats: Arc::clone(&self.stats),
        };
        let task = tokio::spawn(event_loop(ctx, watcher, raw_rx, shutdown_rx));

        *active = Some(ActiveWatch {
            shutdown_tx,
            task,
            watched,
        });
        tracing::info!(
            root = %self.root.display(),
            depth = self.options.depth,
            registered,
            "File watcher started"
        );
        Ok(())
    }

    /// Stop watching: close every OS watch, cancel pending debounce timers,
    /// clear the watched set. Idempotent.
    pub async fn stop(&self) {
        let active = { self.active.lock().take() };
        if let Some(active) = active {
            let _ = active.shutdown_tx.send(()).await;
            let _ = active.task.await;
            tracing::info!("File watcher stopped");
        }
    }

    /// Whether the event loop is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Current watcher status.
    #[must_use]
    pub fn status(&self) -> WatcherStatus {
        let active = self.active.lock();
        let (running, watched_directories) = active
            .as_ref()
            .map_or((false, 0), |a| (true, a.watched.lock().len()));

        WatcherStatus {
            enabled: self.options.enabled,
            active: running,
            watched_directories,
            watch_depth: self.options.depth,
        }
    }

    /// Event counters since construction.
    #[must_use]
    pub fn stats(&self) -> WatchStatsSnapshot {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("root", &self.root)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

struct LoopCtx {
    db: Database,
    root: PathBuf,
    depth: i64,
    debounce: Duration,
    ignore: IgnorePatterns,
    watched: Arc<Mutex<HashSet<PathBuf>>>,
    stats: Arc<WatchStats>,
}

async fn event_loop(
    ctx: LoopCtx,
    mut watcher: RecommendedWatcher,
    mut raw_rx: mpsc::Receiver<notify::Event>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let (fire_tx, mut fire_rx) = mpsc::channel(100);
    let mut debouncer = Debouncer::new(ctx.debounce, fire_tx);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debouncer.cancel_all();
                break;
            }
            event = raw_rx.recv() => {
                let Some(event) = event else { break };
                let Some(kind) = DebounceKind::from_event(&event.kind) else { continue };
                for path in event.paths {
                    if !path.starts_with(&ctx.root) || ctx.ignore.is_ignored(&path) {
                        continue;
                    }
                    ctx.stats.events_seen.fetch_add(1, Ordering::Relaxed);
                    debouncer.arm(DebounceKey::new(kind, path));
                }
            }
            key = fire_rx.recv() => {
                if let Some(key) = key {
                    debouncer.complete(&key);
                    ctx.stats.events_handled.fetch_add(1, Ordering::Relaxed);
                    apply_change(&ctx, &mut watcher, &key);
                }
            }
        }
    }

    tracing::debug!("Watcher event loop exited");
}

/// Apply one settled change: stat the path and update index and watch set
/// to match what is on disk now.
fn apply_change(ctx: &LoopCtx, watcher: &mut RecommendedWatcher, key: &DebounceKey) {
    let rel = record::relative_slash_path(&key.path, &ctx.root);
    if rel.is_empty() {
        return;
    }

    match fs::metadata(&key.path) {
        Err(_) => {
            match ctx.db.with_conn(|conn| storage::delete_file(conn, &rel)) {
                Ok(true) => {
                    ctx.stats.index_deletes.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %rel, "Removed deleted entry from index");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %rel, error = %e, "Failed to remove entry from index");
                }
            }
            if ctx.watched.lock().remove(&key.path) {
                tracing::debug!(path = %key.path.display(), "Dropped watch for removed directory");
            }
        }
        Ok(meta) if meta.is_dir() => watch_new_directory(ctx, watcher, &key.path),
        Ok(meta) => {
            let Some(rec) = FileRecord::for_file(&key.path, &ctx.root, &meta) else {
                return;
            };
            match ctx
                .db
                .with_conn(|conn| storage::upsert_files(conn, std::slice::from_ref(&rec)))
            {
                Ok(_) => {
                    ctx.stats.index_upserts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %rel, kind = key.kind.as_str(), "Reindexed changed file");
                }
                Err(e) => {
                    tracing::warn!(path = %rel, error = %e, "Failed to reindex changed file");
                }
            }
        }
    }
}

fn watch_new_directory(ctx: &LoopCtx, watcher: &mut RecommendedWatcher, path: &Path) {
    if !within_depth(&ctx.root, path, ctx.depth) {
        return;
    }
    let mut watched = ctx.watched.lock();
    if watched.contains(path) {
        return;
    }
    match watcher.watch(path, RecursiveMode::NonRecursive) {
        Ok(()) => {
            watched.insert(path.to_path_buf());
            tracing::info!(path = %path.display(), "Watching new directory");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to watch new directory");
        }
    }
}

fn within_depth(root: &Path, path: &Path, depth: i64) -> bool {
    if depth < 0 {
        return true;
    }
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    let levels = i64::try_from(rel.components().count()).unwrap_or(i64::MAX);
    levels <= depth
}

/// Register the root and subdirectories down to `depth`, skipping ignored
/// trees. Returns how many watches took.
fn register_watches(
    watcher: &mut RecommendedWatcher,
    root: &Path,
    depth: i64,
    ignore: &IgnorePatterns,
    watched: &Mutex<HashSet<PathBuf>>,
) -> usize {
    let mut walk = WalkDir::new(root).follow_links(true);
    if let Ok(max) = usize::try_from(depth) {
        walk = walk.max_depth(max);
    }

    let mut registered = 0;
    for entry in walk.into_iter().filter_entry(|e| !ignore.is_ignored(e.path())) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping walk error during watch registration");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        match watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
            Ok(()) => {
                watched.lock().insert(entry.path().to_path_buf());
                registered += 1;
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to watch directory");
            }
        }
    }
    registered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_storage;
    use std::fs;
    use tempfile::TempDir;

    fn service(root: &Path, options: WatchOptions) -> FileWatcher {
        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        FileWatcher::new(db, root.to_path_buf(), options)
    }

    #[test]
    fn test_within_depth() {
        let root = Path::new("/data");
        assert!(within_depth(root, Path::new("/data"), 0));
        assert!(!within_depth(root, Path::new("/data/a"), 0));
        assert!(within_depth(root, Path::new("/data/a"), 1));
        assert!(!within_depth(root, Path::new("/data/a/b"), 1));
        assert!(within_depth(root, Path::new("/data/a/b/c"), -1));
        assert!(!within_depth(root, Path::new("/elsewhere"), 5));
    }

    #[test]
    fn test_status_when_stopped() {
        let tmp = TempDir::new().unwrap();
        let watcher = service(tmp.path(), WatchOptions::default());

        let status = watcher.status();
        assert!(status.enabled);
        assert!(!status.active);
        assert_eq!(status.watched_directories, 0);
        assert_eq!(status.watch_depth, 1);
    }

    #[tokio::test]
    async fn test_disabled_watcher_never_activates() {
        let tmp = TempDir::new().unwrap();
        let watcher = service(
            tmp.path(),
            WatchOptions {
                enabled: false,
                ..WatchOptions::default()
            },
        );

        watcher.start().unwrap();
        assert!(!watcher.is_active());
    }

    #[tokio::test]
    async fn test_start_registers_to_depth_and_stop_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::create_dir(tmp.path().join("c")).unwrap();

        let watcher = service(
            tmp.path(),
            WatchOptions {
                depth: 1,
                ..WatchOptions::default()
            },
        );

        watcher.start().unwrap();
        assert!(watcher.is_active());
        // root, a, c; a/b is below the depth limit
        assert_eq!(watcher.status().watched_directories, 3);

        // second start is a no-op
        watcher.start().unwrap();

        watcher.stop().await;
        assert!(!watcher.is_active());
        watcher.stop().await;
    }

    #[tokio::test]
    async fn test_ignored_directories_are_not_registered() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("node_modules")).unwrap();
        fs::create_dir(tmp.path().join("src")).unwrap();

        let watcher = service(tmp.path(), WatchOptions::default());
        watcher.start().unwrap();
        // root and src only
        assert_eq!(watcher.status().watched_directories, 2);
        watcher.stop().await;
    }
}
