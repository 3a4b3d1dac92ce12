//! Index build orchestration.
//!
//! The [`Indexer`] owns the one build-in-progress flag in the process. A
//! build clears the store, fans the walk plan out over a worker pool, and
//! persists chunk results in batches as they arrive, so progress is visible
//! while the walk is still running. Requests to build while a build is
//! running get a rejection response, never a queue slot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::plan;
use crate::scan::{pool, FanOut, FileRecord, ScanFilter};
use crate::storage::{self, Database};
use crate::Result;

/// Message returned when a build is requested during an active build.
pub const BUILD_IN_PROGRESS: &str = "Index build already in progress";

/// Mutable counters for a build in flight.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProgress {
    /// Expected file count, from the pre-build parallel count. Advisory.
    pub total: u64,
    /// Rows persisted so far.
    pub processed: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub file_count: u64,
    pub last_built: Option<DateTime<Utc>>,
    pub is_building: bool,
    pub progress: IndexProgress,
}

/// Result of a build request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_built: Option<DateTime<Utc>>,
}

impl BuildOutcome {
    fn rejected() -> Self {
        Self {
            success: false,
            message: BUILD_IN_PROGRESS.to_string(),
            file_count: None,
            last_built: None,
        }
    }

    fn completed(file_count: u64, last_built: DateTime<Utc>) -> Self {
        Self {
            success: true,
            message: format!("Indexed {file_count} files"),
            file_count: Some(file_count),
            last_built: Some(last_built),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            file_count: None,
            last_built: None,
        }
    }
}

/// Index build service. Cheap to share behind an `Arc`.
pub struct Indexer {
    db: Database,
    root: PathBuf,
    batch_size: usize,
    building: AtomicBool,
    progress: Mutex<IndexProgress>,
}

impl Indexer {
    #[must_use]
    pub fn new(db: Database, root: PathBuf, batch_size: usize) -> Self {
        Self {
            db,
            root,
            batch_size: batch_size.max(1),
            building: AtomicBool::new(false),
            progress: Mutex::new(IndexProgress::default()),
        }
    }

    /// Whether a build is currently running.
    #[must_use]
    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Whether the store holds anything to query.
    ///
    /// # Errors
    ///
    /// Returns an error if the row count query fails.
    pub fn is_built(&self) -> Result<bool> {
        Ok(self.db.with_conn(storage::file_count)? > 0)
    }

    /// Current index stats and build progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    pub fn status(&self) -> Result<IndexStatus> {
        let stats = self.db.with_conn(storage::index_stats)?;
        Ok(IndexStatus {
            file_count: stats.file_count,
            last_built: stats.last_built,
            is_building: self.is_building(),
            progress: self.progress.lock().clone(),
        })
    }

    /// Remove every indexed row.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub fn clear(&self) -> Result<()> {
        self.db.with_transaction(storage::clear_files)
    }

    /// Run a full rebuild on the current thread.
    ///
    /// Exactly one build runs at a time; a second request returns the
    /// rejection outcome immediately. Pipeline errors are reported in the
    /// outcome, not as `Err` (the flag is always released).
    ///
    /// # Errors
    ///
    /// This method itself does not fail; the outcome carries success.
    pub fn build(&self) -> Result<BuildOutcome> {
        if self
            .building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Rejecting build request, one is already running");
            return Ok(BuildOutcome::rejected());
        }

        let result = self.run_build();
        self.building.store(false, Ordering::SeqCst);

        match result {
            Ok((file_count, last_built)) => Ok(BuildOutcome::completed(file_count, last_built)),
            Err(e) => {
                tracing::error!(error = %e, "Index build failed");
                Ok(BuildOutcome::failed(e.to_string()))
            }
        }
    }

    /// Run a full rebuild off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking task panics.
    pub async fn build_async(self: &Arc<Self>) -> Result<BuildOutcome> {
        let indexer = Arc::clone(self);
        tokio::task::spawn_blocking(move || indexer.build())
            .await
            .map_err(|e| crate::Error::internal(format!("build task failed: {e}")))?
    }

    fn run_build(&self) -> Result<(u64, DateTime<Utc>)> {
        let started = std::time::Instant::now();
        tracing::info!(root = %self.root.display(), "Starting index build");

        *self.progress.lock() = IndexProgress::default();
        self.db.with_transaction(storage::clear_files)?;

        let workers = plan::build_workers();
        let tasks = plan::build_plan(&self.root, workers)?;
        let chunks = pool::partition(tasks, workers);

        let total = self.count_files(chunks.clone(), workers)?;
        {
            let mut progress = self.progress.lock();
            progress.total = total;
            progress.last_updated = Some(Utc::now());
        }
        tracing::info!(total, workers, chunks = chunks.len(), "Counted files, walking");

        let base = self.root.clone();
        let filter = ScanFilter::All;
        let fan_out = FanOut::spawn(chunks, workers, move |tasks| {
            pool::collect_chunk(tasks, &base, &filter)
        })?;

        let mut indexed: u64 = 0;
        fan_out.drain(|id, result| match result {
            Ok(records) => indexed += self.persist_records(&records),
            Err(e) => {
                tracing::warn!(chunk = id, error = %e, "skipping failed chunk during build");
            }
        });

        let last_built = Utc::now();
        self.db.with_conn(|conn| {
            storage::set_metadata(conn, "last_built", &last_built.to_rfc3339())
        })?;

        tracing::info!(
            indexed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Index build complete"
        );
        Ok((indexed, last_built))
    }

    /// Persist one chunk's records in batches, bumping progress per batch.
    /// A failed batch is logged and contributes nothing.
    fn persist_records(&self, records: &[FileRecord]) -> u64 {
        let mut written_total = 0u64;
        for batch in records.chunks(self.batch_size) {
            match self
                .db
                .with_transaction(|conn| storage::upsert_files(conn, batch))
            {
                Ok(written) => {
                    let written = written as u64;
                    written_total += written;
                    let mut progress = self.progress.lock();
                    progress.processed += written;
                    progress.last_updated = Some(Utc::now());
                }
                Err(e) => {
                    tracing::warn!(batch = batch.len(), error = %e, "skipping batch that failed to persist");
                }
            }
        }
        written_total
    }

    fn count_files(&self, chunks: Vec<Vec<crate::scan::WalkTask>>, workers: usize) -> Result<u64> {
        let fan_out = FanOut::spawn(chunks, workers, |tasks| pool::count_chunk(tasks))?;
        let mut total = 0u64;
        fan_out.drain(|id, result| match result {
            Ok(count) => total += count,
            Err(e) => tracing::debug!(chunk = id, error = %e, "skipping failed chunk in count"),
        });
        Ok(total)
    }
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("root", &self.root)
            .field("building", &self.is_building())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_storage;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Indexer) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::create_dir(tmp.path().join("c")).unwrap();
        fs::write(tmp.path().join("a/1.txt"), "one").unwrap();
        fs::write(tmp.path().join("a/b/2.jpg"), "two").unwrap();
        fs::write(tmp.path().join("c/3.mp4"), "three").unwrap();

        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let indexer = Indexer::new(db, tmp.path().to_path_buf(), 100);
        (tmp, indexer)
    }

    #[test]
    fn test_build_indexes_every_file() {
        let (_tmp, indexer) = fixture();

        let outcome = indexer.build().unwrap();
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.file_count, Some(3));
        assert!(outcome.last_built.is_some());
        assert!(!indexer.is_building());
        assert!(indexer.is_built().unwrap());

        let found = indexer
            .db
            .with_conn(|conn| storage::search_files(conn, ".txt", ""))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "a/1.txt");
        assert_eq!(found[0].file_type.as_str(), "document");
    }

    #[test]
    fn test_rebuild_keeps_row_count_stable() {
        let (_tmp, indexer) = fixture();

        indexer.build().unwrap();
        let outcome = indexer.build().unwrap();
        assert_eq!(outcome.file_count, Some(3));
        assert_eq!(indexer.status().unwrap().file_count, 3);
    }

    #[test]
    fn test_build_reports_progress_totals() {
        let (_tmp, indexer) = fixture();

        indexer.build().unwrap();
        let status = indexer.status().unwrap();
        assert_eq!(status.progress.total, 3);
        assert_eq!(status.progress.processed, 3);
        assert!(status.progress.last_updated.is_some());
        assert!(!status.is_building);
    }

    #[test]
    fn test_concurrent_build_is_rejected() {
        let (_tmp, indexer) = fixture();

        indexer.building.store(true, Ordering::SeqCst);
        let outcome = indexer.build().unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message, BUILD_IN_PROGRESS);

        // the running "build" is unaffected
        assert!(indexer.is_building());
        indexer.building.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_build_failure_releases_flag() {
        let tmp = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        init_storage(&db).unwrap();
        let indexer = Indexer::new(db, tmp.path().join("gone"), 100);

        let outcome = indexer.build().unwrap();
        assert!(!outcome.success);
        assert!(!indexer.is_building());
    }

    #[test]
    fn test_clear_empties_the_store() {
        let (_tmp, indexer) = fixture();

        indexer.build().unwrap();
        indexer.clear().unwrap();
        assert!(!indexer.is_built().unwrap());
        assert!(indexer.status().unwrap().last_built.is_none());
    }

    #[tokio::test]
    async fn test_build_async() {
        let (_tmp, indexer) = fixture();
        let indexer = Arc::new(indexer);

        let outcome = indexer.build_async().await.unwrap();
        assert_eq!(outcome.file_count, Some(3));
    }
}
