//! File records produced by traversal and stored in the index.

use std::fs::Metadata;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::FileCategory;

/// One filesystem entry, as exposed in listings, search results, and the
/// index.
///
/// `path` is relative to the served root and forward-slash normalized on
/// every platform; it is the unique key in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Base name of the entry.
    pub name: String,

    /// Root-relative path, forward slashes.
    pub path: String,

    /// Byte length; 0 for directories.
    pub size: u64,

    /// Last modification time.
    pub mtime: DateTime<Utc>,

    /// Classifier category; `directory` for directories.
    #[serde(rename = "type")]
    pub file_type: FileCategory,

    /// Whether the entry is a directory.
    #[serde(rename = "isDirectory")]
    pub is_directory: bool,
}

impl FileRecord {
    /// Build a record for a regular file from its metadata.
    ///
    /// Returns `None` when the path has no base name (never the case for
    /// entries yielded by traversal).
    #[must_use]
    pub fn for_file(abs_path: &Path, base: &Path, meta: &Metadata) -> Option<Self> {
        let name = abs_path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            path: relative_slash_path(abs_path, base),
            size: meta.len(),
            mtime: modified_time(meta),
            file_type: FileCategory::from_path(abs_path),
            is_directory: false,
            name,
        })
    }

    /// Build a record for a directory from its metadata.
    #[must_use]
    pub fn for_directory(abs_path: &Path, base: &Path, meta: &Metadata) -> Option<Self> {
        let name = abs_path.file_name()?.to_string_lossy().into_owned();
        Some(Self {
            path: relative_slash_path(abs_path, base),
            size: 0,
            mtime: modified_time(meta),
            file_type: FileCategory::Directory,
            is_directory: true,
            name,
        })
    }
}

/// Modification time from metadata, falling back to now when the platform
/// cannot report one.
fn modified_time(meta: &Metadata) -> DateTime<Utc> {
    meta.modified()
        .map_or_else(|_| Utc::now(), DateTime::<Utc>::from)
}

/// Path relative to `base`, forward-slash joined.
///
/// Paths outside `base` fall back to the full path; callers guard against
/// escapes before traversal starts.
#[must_use]
pub fn relative_slash_path(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let mut out = String::new();
    for component in rel.components() {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    out
}
