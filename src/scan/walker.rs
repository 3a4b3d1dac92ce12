//! Shallow and deep directory traversal.
//!
//! Traversal is tolerant per entry: anything that cannot be stat-ed or read
//! is logged and skipped, and a partial result is returned. Only a root that
//! cannot be enumerated at all fails a walk. Ordering of results is not
//! guaranteed.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::record::FileRecord;
use crate::classify::FileCategory;
use crate::error::ScanError;

/// Filter applied during traversal.
#[derive(Debug, Clone)]
pub enum ScanFilter {
    /// Every file; directories never match. Used by the index builder.
    All,
    /// Entries whose name contains the query, case-insensitively.
    /// Directories match in deep walks (they appear in search results).
    NameContains(String),
    /// Files classified as images; directories never match.
    Images,
}

impl ScanFilter {
    /// Substring filter; the query is lowercased once here.
    #[must_use]
    pub fn name_contains(query: impl Into<String>) -> Self {
        Self::NameContains(query.into().to_lowercase())
    }

    fn matches_file(&self, name: &str, path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::NameContains(query) => name.to_lowercase().contains(query),
            Self::Images => FileCategory::from_path(path) == FileCategory::Image,
        }
    }

    fn matches_dir(&self, name: &str) -> bool {
        match self {
            Self::NameContains(query) => name.to_lowercase().contains(query),
            Self::All | Self::Images => false,
        }
    }
}

/// How a walk task covers its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Immediate files only; subdirectories are covered by other tasks.
    Shallow,
    /// The directory itself plus its whole subtree.
    Deep,
}

/// One unit of traversal work handed to a fan-out worker.
#[derive(Debug, Clone)]
pub struct WalkTask {
    pub dir: PathBuf,
    pub mode: WalkMode,
}

impl WalkTask {
    #[must_use]
    pub fn shallow(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: WalkMode::Shallow,
        }
    }

    #[must_use]
    pub fn deep(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            mode: WalkMode::Deep,
        }
    }
}

/// Immediate subdirectories of `dir`.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read; unreadable entries are
/// skipped.
pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => subdirs.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
            }
        }
    }
    Ok(subdirs)
}

/// Every immediate entry of `dir` as a record, directories included.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn list_entries(dir: &Path, base: &Path) -> Result<Vec<FileRecord>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut records = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let record = if meta.is_dir() {
            FileRecord::for_directory(&path, base, &meta)
        } else {
            FileRecord::for_file(&path, base, &meta)
        };
        if let Some(record) = record {
            records.push(record);
        }
    }
    Ok(records)
}

/// Immediate files of `dir` matching the filter. Directories are ignored;
/// this is the root slice of a fan-out and the shallow walk-task body.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn scan_dir_files(
    dir: &Path,
    base: &Path,
    filter: &ScanFilter,
) -> Result<Vec<FileRecord>, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut records = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if meta.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if filter.matches_file(&name.to_string_lossy(), &path) {
            if let Some(record) = FileRecord::for_file(&path, base, &meta) {
                records.push(record);
            }
        }
    }
    Ok(records)
}

/// Deep walk of everything strictly below `dir`.
///
/// Matching directories are included as records; descent never depends on a
/// match. Symlinks are followed the way a stat-based walk follows them;
/// walkdir's loop detection turns cycles into skipped entries.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn scan_tree(
    dir: &Path,
    base: &Path,
    filter: &ScanFilter,
) -> Result<Vec<FileRecord>, ScanError> {
    fs::metadata(dir).map_err(|e| ScanError::read_dir(dir, &e))?;
    let mut records = Vec::new();
    walk_below(dir, base, filter, &mut records);
    Ok(records)
}

/// Deep walk of `dir` including `dir` itself as a match candidate.
///
/// Fan-out workers use this so a chunk covers exactly the subtrees it was
/// assigned, own directory names included; the union of all chunks plus the
/// root slice then equals a single-threaded deep walk.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn scan_subtree(
    dir: &Path,
    base: &Path,
    filter: &ScanFilter,
) -> Result<Vec<FileRecord>, ScanError> {
    let meta = fs::metadata(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut records = Vec::new();
    if let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) {
        if meta.is_dir() && filter.matches_dir(&name) {
            if let Some(record) = FileRecord::for_directory(dir, base, &meta) {
                records.push(record);
            }
        }
    }
    walk_below(dir, base, filter, &mut records);
    Ok(records)
}

/// Count of files strictly below and directly in `dir` (directories are not
/// counted). Advisory; used for build progress totals.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn count_tree(dir: &Path) -> Result<u64, ScanError> {
    fs::metadata(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut count = 0u64;
    for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
        match entry {
            Ok(entry) if !entry.file_type().is_dir() => count += 1,
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "skipping walk error while counting"),
        }
    }
    Ok(count)
}

/// Count of immediate files in `dir`.
///
/// # Errors
///
/// Fails only when `dir` itself cannot be read.
pub fn count_dir_files(dir: &Path) -> Result<u64, ScanError> {
    let entries = fs::read_dir(dir).map_err(|e| ScanError::read_dir(dir, &e))?;

    let mut count = 0u64;
    for entry in entries.flatten() {
        match fs::metadata(entry.path()) {
            Ok(meta) if !meta.is_dir() => count += 1,
            _ => {}
        }
    }
    Ok(count)
}

/// Run one walk task.
///
/// # Errors
///
/// Fails when the task's directory cannot be read.
pub fn run_walk_task(
    task: &WalkTask,
    base: &Path,
    filter: &ScanFilter,
) -> Result<Vec<FileRecord>, ScanError> {
    match task.mode {
        WalkMode::Shallow => scan_dir_files(&task.dir, base, filter),
        WalkMode::Deep => scan_subtree(&task.dir, base, filter),
    }
}

/// Count the files a walk task would visit.
///
/// # Errors
///
/// Fails when the task's directory cannot be read.
pub fn count_walk_task(task: &WalkTask) -> Result<u64, ScanError> {
    match task.mode {
        WalkMode::Shallow => count_dir_files(&task.dir),
        WalkMode::Deep => count_tree(&task.dir),
    }
}

fn walk_below(dir: &Path, base: &Path, filter: &ScanFilter, records: &mut Vec<FileRecord>) {
    for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping walk error");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_dir();

        let matched = if is_dir {
            filter.matches_dir(&name)
        } else {
            filter.matches_file(&name, entry.path())
        };
        if !matched {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let record = if is_dir {
            FileRecord::for_directory(entry.path(), base, &meta)
        } else {
            FileRecord::for_file(entry.path(), base, &meta)
        };
        if let Some(record) = record {
            records.push(record);
        }
    }
}
