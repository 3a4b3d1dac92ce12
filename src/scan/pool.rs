//! Worker-pool fan-out over directory chunks.
//!
//! A scan of a large tree is split at the top level: immediate
//! subdirectories are partitioned into contiguous chunks, a short-lived
//! worker pool walks one chunk per task message, and the calling thread
//! collects the root's own files while the workers run. Results come back
//! over a fan-in channel tagged with the chunk index so concatenation order
//! is deterministic regardless of completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};

use super::record::FileRecord;
use super::walker::{self, ScanFilter, WalkTask};
use crate::error::ScanError;
use crate::Result;

/// Number of workers the machine supports.
#[must_use]
pub fn available_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Split tasks into at most `num_chunks` contiguous blocks of ceiling size.
///
/// With 5 tasks over 3 chunks the blocks are 2, 2 and 1; every task lands in
/// exactly one block and input order is preserved.
#[must_use]
pub fn partition(tasks: Vec<WalkTask>, num_chunks: usize) -> Vec<Vec<WalkTask>> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let chunk_size = tasks.len().div_ceil(num_chunks.max(1));
    let mut chunks = Vec::with_capacity(tasks.len().div_ceil(chunk_size));
    let mut rest = tasks;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk_size.min(rest.len()));
        chunks.push(rest);
        rest = tail;
    }
    chunks
}

/// Walk every task in a chunk and collect matching records.
///
/// A chunk is all or nothing: the first unreadable task directory fails the
/// whole chunk. Unreadable entries below a task directory are skipped by the
/// walker as usual.
///
/// # Errors
///
/// Returns the first task-level walk failure.
pub fn collect_chunk(
    tasks: &[WalkTask],
    base: &Path,
    filter: &ScanFilter,
) -> std::result::Result<Vec<FileRecord>, ScanError> {
    let mut records = Vec::new();
    for task in tasks {
        records.extend(walker::run_walk_task(task, base, filter)?);
    }
    Ok(records)
}

/// Count the files every task in a chunk would visit.
///
/// # Errors
///
/// Returns the first task-level walk failure.
pub fn count_chunk(tasks: &[WalkTask]) -> std::result::Result<u64, ScanError> {
    let mut count = 0;
    for task in tasks {
        count += walker::count_walk_task(task)?;
    }
    Ok(count)
}

struct ChunkTask {
    id: usize,
    tasks: Vec<WalkTask>,
}

/// A running fan-out: workers are walking their chunks and the fan-in
/// receiver is waiting to be drained.
pub struct FanOut<T> {
    result_rx: Receiver<(usize, std::result::Result<T, ScanError>)>,
    expected: usize,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl<T: Send + 'static> FanOut<T> {
    /// Queue the chunks and start the workers.
    ///
    /// The caller stays free to do its own work (typically the root slice)
    /// until it calls [`FanOut::drain`].
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn spawn<F>(chunks: Vec<Vec<WalkTask>>, num_workers: usize, job: F) -> Result<Self>
    where
        F: Fn(&[WalkTask]) -> std::result::Result<T, ScanError> + Send + Sync + 'static,
    {
        let expected = chunks.len();
        let num_workers = num_workers.clamp(1, expected.max(1));

        let (task_tx, task_rx): (Sender<ChunkTask>, Receiver<ChunkTask>) = bounded(expected);
        let (result_tx, result_rx) = bounded(expected);

        for (id, tasks) in chunks.into_iter().enumerate() {
            // Cannot fail: capacity equals the chunk count and the receiver
            // is still alive.
            let _ = task_tx.send(ChunkTask { id, tasks });
        }
        drop(task_tx);

        let job = Arc::new(job);
        let mut workers = Vec::with_capacity(num_workers);
        for i in 0..num_workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let job = Arc::clone(&job);

            let handle = std::thread::Builder::new()
                .name(format!("scan-worker-{i}"))
                .spawn(move || worker_loop(&task_rx, &result_tx, job.as_ref()))?;
            workers.push(handle);
        }
        drop(result_tx);

        tracing::debug!(num_workers, num_chunks = expected, "scan fan-out started");

        Ok(Self {
            result_rx,
            expected,
            workers,
        })
    }

    /// Receive every chunk result and join the workers.
    ///
    /// `on_chunk` is called exactly once per chunk index, on the calling
    /// thread. A chunk whose worker died before reporting is delivered as
    /// [`ScanError::ChunkLost`].
    pub fn drain(self, mut on_chunk: impl FnMut(usize, std::result::Result<T, ScanError>)) {
        let mut delivered = vec![false; self.expected];

        for _ in 0..self.expected {
            match self.result_rx.recv() {
                Ok((id, result)) => {
                    delivered[id] = true;
                    on_chunk(id, result);
                }
                // All workers are gone; whatever is missing stays missing.
                Err(_) => break,
            }
        }
        for handle in self.workers {
            let _ = handle.join();
        }
        for (id, seen) in delivered.into_iter().enumerate() {
            if !seen {
                on_chunk(id, Err(ScanError::ChunkLost { chunk: id }));
            }
        }
    }
}

fn worker_loop<T, F>(
    task_rx: &Receiver<ChunkTask>,
    result_tx: &Sender<(usize, std::result::Result<T, ScanError>)>,
    job: &F,
) where
    F: Fn(&[WalkTask]) -> std::result::Result<T, ScanError>,
{
    while let Ok(chunk) = task_rx.recv() {
        let result = job(&chunk.tasks);
        // Ignore error if the drain side already gave up.
        let _ = result_tx.send((chunk.id, result));
    }
}

/// Fan a filtered scan of `root` out over its immediate subdirectories.
///
/// One deep chunk per worker covers the subdirectories while the calling
/// thread collects the root's immediate files, so the union equals a single
/// deep walk of `root`. Failed chunks are logged and skipped; their subtrees
/// are simply absent from the result. A tree with no subdirectories is
/// scanned on the calling thread alone.
///
/// # Errors
///
/// Returns an error when `root` itself cannot be read or the pool cannot be
/// started.
pub fn parallel_scan(root: &Path, filter: &ScanFilter) -> Result<Vec<FileRecord>> {
    let subdirs = walker::subdirectories(root)?;
    if subdirs.is_empty() {
        return Ok(walker::scan_dir_files(root, root, filter)?);
    }

    let num_workers = subdirs.len().min(available_workers());
    let chunks = partition(subdirs.into_iter().map(WalkTask::deep).collect(), num_workers);
    let expected = chunks.len();

    let job_base = root.to_path_buf();
    let job_filter = filter.clone();
    let pool = FanOut::spawn(chunks, num_workers, move |tasks| {
        collect_chunk(tasks, &job_base, &job_filter)
    })?;

    // Root slice runs concurrently with the workers.
    let mut results = walker::scan_dir_files(root, root, filter)?;

    let mut slots: Vec<Option<Vec<FileRecord>>> = vec![None; expected];
    pool.drain(|id, result| match result {
        Ok(records) => slots[id] = Some(records),
        Err(e) => {
            tracing::warn!(chunk = id, error = %e, "skipping failed directory chunk");
        }
    });
    for slot in slots {
        if let Some(records) = slot {
            results.extend(records);
        }
    }
    Ok(results)
}

/// Run [`parallel_scan`] off the async runtime.
///
/// # Errors
///
/// Returns an error if the scan fails or the blocking task panics.
pub async fn parallel_scan_async(root: PathBuf, filter: ScanFilter) -> Result<Vec<FileRecord>> {
    tokio::task::spawn_blocking(move || parallel_scan(&root, &filter))
        .await
        .map_err(|e| crate::Error::internal(format!("scan task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::walker::scan_tree;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        for dir in ["alpha/nested", "beta", "gamma/deep/deeper"] {
            fs::create_dir_all(tmp.path().join(dir)).unwrap();
        }
        fs::write(tmp.path().join("top.txt"), "t").unwrap();
        fs::write(tmp.path().join("alpha/a.txt"), "a").unwrap();
        fs::write(tmp.path().join("alpha/nested/n.jpg"), "n").unwrap();
        fs::write(tmp.path().join("beta/b.mp4"), "b").unwrap();
        fs::write(tmp.path().join("gamma/deep/deeper/g.pdf"), "g").unwrap();
        tmp
    }

    fn sorted_paths(records: &[FileRecord]) -> Vec<String> {
        let mut out: Vec<String> = records.iter().map(|r| r.path.clone()).collect();
        out.sort();
        out
    }

    #[test]
    fn test_partition_ceiling_blocks() {
        let tasks: Vec<WalkTask> = (0..5).map(|i| WalkTask::deep(format!("d{i}"))).collect();
        let chunks = partition(tasks, 3);
        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 2, 1]);

        // order is preserved across blocks
        let flat: Vec<String> = chunks
            .iter()
            .flatten()
            .map(|t| t.dir.display().to_string())
            .collect();
        assert_eq!(flat, ["d0", "d1", "d2", "d3", "d4"]);
    }

    #[test]
    fn test_partition_fewer_tasks_than_chunks() {
        let tasks = vec![WalkTask::deep("only")];
        let chunks = partition(tasks, 4);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 1);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_fan_out_delivers_every_chunk_in_slot_order() {
        let tmp = fixture();
        let base = tmp.path().to_path_buf();
        let chunks = vec![
            vec![WalkTask::deep(tmp.path().join("alpha"))],
            vec![WalkTask::deep(tmp.path().join("beta"))],
            vec![WalkTask::deep(tmp.path().join("gamma"))],
        ];

        let filter = ScanFilter::All;
        let pool = FanOut::spawn(chunks, 3, move |tasks| {
            collect_chunk(tasks, &base, &filter)
        })
        .unwrap();

        let mut seen = vec![false; 3];
        let mut total = 0;
        pool.drain(|id, result| {
            seen[id] = true;
            total += result.unwrap().len();
        });
        assert!(seen.iter().all(|&s| s));
        assert_eq!(total, 4);
    }

    #[test]
    fn test_fan_out_reports_failed_chunk_without_dropping_others() {
        let tmp = fixture();
        let base = tmp.path().to_path_buf();
        let chunks = vec![
            vec![WalkTask::deep(tmp.path().join("alpha"))],
            vec![WalkTask::deep(tmp.path().join("does-not-exist"))],
        ];

        let filter = ScanFilter::All;
        let pool = FanOut::spawn(chunks, 2, move |tasks| {
            collect_chunk(tasks, &base, &filter)
        })
        .unwrap();

        let mut results: Vec<(usize, bool)> = Vec::new();
        pool.drain(|id, result| results.push((id, result.is_ok())));
        results.sort();
        assert_eq!(results, [(0, true), (1, false)]);
    }

    #[test]
    fn test_fan_out_lost_chunk_when_worker_panics() {
        let tmp = fixture();
        let chunks = vec![vec![WalkTask::deep(tmp.path().join("alpha"))]];

        let pool: FanOut<Vec<FileRecord>> =
            FanOut::spawn(chunks, 1, |_tasks| panic!("worker died")).unwrap();

        let mut lost = 0;
        pool.drain(|id, result| {
            assert_eq!(id, 0);
            assert!(matches!(result, Err(ScanError::ChunkLost { chunk: 0 })));
            lost += 1;
        });
        assert_eq!(lost, 1);
    }

    #[test]
    fn test_count_chunk() {
        let tmp = fixture();
        let tasks = vec![
            WalkTask::shallow(tmp.path()),
            WalkTask::deep(tmp.path().join("alpha")),
            WalkTask::deep(tmp.path().join("gamma")),
        ];
        assert_eq!(count_chunk(&tasks).unwrap(), 4);
    }

    #[test]
    fn test_parallel_scan_matches_single_threaded_walk() {
        let tmp = fixture();

        for filter in [
            ScanFilter::All,
            ScanFilter::Images,
            ScanFilter::name_contains("e"),
        ] {
            let parallel = parallel_scan(tmp.path(), &filter).unwrap();
            let single = scan_tree(tmp.path(), tmp.path(), &filter).unwrap();
            assert_eq!(
                sorted_paths(&parallel),
                sorted_paths(&single),
                "filter {filter:?} diverged"
            );
        }
    }

    #[test]
    fn test_parallel_scan_includes_matching_directory_names() {
        let tmp = fixture();
        let records = parallel_scan(tmp.path(), &ScanFilter::name_contains("deep")).unwrap();
        let paths = sorted_paths(&records);
        assert_eq!(paths, ["gamma/deep", "gamma/deep/deeper"]);
        assert!(records.iter().all(|r| r.is_directory));
    }

    #[test]
    fn test_parallel_scan_flat_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("only.txt"), "x").unwrap();
        let records = parallel_scan(tmp.path(), &ScanFilter::All).unwrap();
        assert_eq!(sorted_paths(&records), ["only.txt"]);
    }

    #[test]
    fn test_parallel_scan_missing_root() {
        let tmp = TempDir::new().unwrap();
        assert!(parallel_scan(&tmp.path().join("gone"), &ScanFilter::All).is_err());
    }

    #[tokio::test]
    async fn test_parallel_scan_async() {
        let tmp = fixture();
        let records = parallel_scan_async(tmp.path().to_path_buf(), ScanFilter::Images)
            .await
            .unwrap();
        assert_eq!(sorted_paths(&records), ["alpha/nested/n.jpg"]);
    }
}
