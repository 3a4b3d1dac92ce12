//! Walk planning for index builds.
//!
//! A build covers the whole root exactly once through a list of walk tasks:
//! a shallow task for the root's own files plus one deep task per top-level
//! subdirectory. Trees with few top-level subdirectories are split one level
//! further so the partition has something to spread across the workers.

use std::path::Path;

use crate::error::ScanError;
use crate::scan::{available_workers, walker, WalkTask};

/// Worker count for index builds: one core is left for the server.
#[must_use]
pub fn build_workers() -> usize {
    available_workers().saturating_sub(1).max(1)
}

/// Produce the walk tasks whose union equals one full deep walk of `root`.
///
/// When fewer than `2 * workers` tasks come out of the top level, each
/// top-level subdirectory is expanded into its own shallow task plus deep
/// tasks for its children. A subdirectory that cannot be expanded keeps its
/// deep task, so coverage never changes.
///
/// # Errors
///
/// Returns an error if `root` itself cannot be read.
pub fn build_plan(root: &Path, workers: usize) -> Result<Vec<WalkTask>, ScanError> {
    let subdirs = walker::subdirectories(root)?;

    let mut tasks = vec![WalkTask::shallow(root)];
    tasks.extend(subdirs.iter().cloned().map(WalkTask::deep));

    if tasks.len() >= workers * 2 {
        return Ok(tasks);
    }

    let mut expanded = vec![WalkTask::shallow(root)];
    for subdir in subdirs {
        match walker::subdirectories(&subdir) {
            Ok(children) => {
                expanded.push(WalkTask::shallow(&subdir));
                expanded.extend(children.into_iter().map(WalkTask::deep));
            }
            Err(e) => {
                tracing::debug!(path = %subdir.display(), error = %e, "keeping unexpanded task");
                expanded.push(WalkTask::deep(subdir));
            }
        }
    }
    Ok(expanded)
}
