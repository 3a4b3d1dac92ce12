//! File index operations.
//!
//! One row per root-relative path. All writes go through the orchestrating
//! thread (builder or watcher loop); queries are served straight from the
//! table with hard result caps.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::classify::FileCategory;
use crate::error::StorageError;
use crate::scan::FileRecord;
use crate::Result;

/// Ceiling on name-search results.
pub const SEARCH_RESULT_CAP: u32 = 1000;

/// Ceiling on image-query results.
pub const IMAGE_RESULT_CAP: u32 = 5000;

/// One page of query results.
#[derive(Debug, Clone)]
pub struct FilePage {
    pub records: Vec<FileRecord>,
    pub total: u64,
    pub has_more: bool,
}

/// Aggregate facts about the index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub file_count: u64,
    pub last_built: Option<DateTime<Utc>>,
}

/// Insert or replace a batch of records, keyed by `path`.
///
/// Rows that fail individually are logged and skipped. Returns the number of
/// rows written. Callers run this inside a transaction for atomicity per
/// batch.
///
/// # Errors
///
/// Returns an error if the statement cannot be prepared.
pub fn upsert_files(conn: &Connection, records: &[FileRecord]) -> Result<usize> {
    let mut stmt = conn
        .prepare(
            "INSERT OR REPLACE INTO files (name, path, size, mtime, file_type, is_directory, \
             indexed_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .map_err(|e| StorageError::Database(format!("failed to prepare upsert: {e}")))?;

    let now = unix_now();
    let mut written = 0;
    for record in records {
        let result = stmt.execute(params![
            record.name,
            record.path,
            i64::try_from(record.size).unwrap_or(i64::MAX),
            record.mtime.to_rfc3339(),
            record.file_type.as_str(),
            record.is_directory,
            now,
        ]);
        match result {
            Ok(_) => written += 1,
            Err(e) => {
                tracing::warn!(path = %record.path, error = %e, "skipping row that failed to upsert");
            }
        }
    }

    tracing::trace!(written, batch = records.len(), "Upserted file batch");
    Ok(written)
}

/// Search for entries whose name or path contains `query`, case-insensitive
/// for ASCII, optionally restricted to paths under `dir_prefix`. Capped at
/// [`SEARCH_RESULT_CAP`] rows.
///
/// # Errors
///
/// Returns an error if the query fails or a stored row cannot be decoded.
pub fn search_files(conn: &Connection, query: &str, dir_prefix: &str) -> Result<Vec<FileRecord>> {
    query_records(
        conn,
        "SELECT name, path, size, mtime, file_type, is_directory FROM files
         WHERE (name LIKE ?1 ESCAPE '\\' OR path LIKE ?1 ESCAPE '\\')
           AND path LIKE ?2 ESCAPE '\\'
         ORDER BY path LIMIT ?3",
        params![like_contains(query), like_prefix(dir_prefix), SEARCH_RESULT_CAP],
    )
}

/// Paginated variant of [`search_files`]: 1-based `page`, `limit` rows per
/// page, plus the total match count.
///
/// # Errors
///
/// Returns an error if the query fails or a stored row cannot be decoded.
pub fn search_files_page(
    conn: &Connection,
    query: &str,
    dir_prefix: &str,
    page: u32,
    limit: u32,
) -> Result<FilePage> {
    let total = count_matches(
        conn,
        "SELECT COUNT(*) FROM files
         WHERE (name LIKE ?1 ESCAPE '\\' OR path LIKE ?1 ESCAPE '\\')
           AND path LIKE ?2 ESCAPE '\\'",
        params![like_contains(query), like_prefix(dir_prefix)],
    )?;

    let offset = u64::from(page.max(1) - 1) * u64::from(limit);
    let records = query_records(
        conn,
        "SELECT name, path, size, mtime, file_type, is_directory FROM files
         WHERE (name LIKE ?1 ESCAPE '\\' OR path LIKE ?1 ESCAPE '\\')
           AND path LIKE ?2 ESCAPE '\\'
         ORDER BY path LIMIT ?3 OFFSET ?4",
        params![
            like_contains(query),
            like_prefix(dir_prefix),
            limit,
            i64::try_from(offset).unwrap_or(i64::MAX)
        ],
    )?;

    let has_more = offset + (records.len() as u64) < total;
    Ok(FilePage {
        records,
        total,
        has_more,
    })
}

/// All image-category entries, optionally restricted to `dir_prefix`. Capped
/// at [`IMAGE_RESULT_CAP`] rows.
///
/// # Errors
///
/// Returns an error if the query fails or a stored row cannot be decoded.
pub fn find_images(conn: &Connection, dir_prefix: &str) -> Result<Vec<FileRecord>> {
    query_records(
        conn,
        "SELECT name, path, size, mtime, file_type, is_directory FROM files
         WHERE file_type = 'image' AND path LIKE ?1 ESCAPE '\\'
         ORDER BY path LIMIT ?2",
        params![like_prefix(dir_prefix), IMAGE_RESULT_CAP],
    )
}

/// Paginated variant of [`find_images`].
///
/// # Errors
///
/// Returns an error if the query fails or a stored row cannot be decoded.
pub fn find_images_page(
    conn: &Connection,
    dir_prefix: &str,
    page: u32,
    limit: u32,
) -> Result<FilePage> {
    let total = count_matches(
        conn,
        "SELECT COUNT(*) FROM files WHERE file_type = 'image' AND path LIKE ?1 ESCAPE '\\'",
        params![like_prefix(dir_prefix)],
    )?;

    let offset = u64::from(page.max(1) - 1) * u64::from(limit);
    let records = query_records(
        conn,
        "SELECT name, path, size, mtime, file_type, is_directory FROM files
         WHERE file_type = 'image' AND path LIKE ?1 ESCAPE '\\'
         ORDER BY path LIMIT ?2 OFFSET ?3",
        params![
            like_prefix(dir_prefix),
            limit,
            i64::try_from(offset).unwrap_or(i64::MAX)
        ],
    )?;

    let has_more = offset + (records.len() as u64) < total;
    Ok(FilePage {
        records,
        total,
        has_more,
    })
}

/// Remove the row for an exact root-relative path.
///
/// Returns whether a row was removed.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn delete_file(conn: &Connection, path: &str) -> Result<bool> {
    let rows = conn
        .execute("DELETE FROM files WHERE path = ?", [path])
        .map_err(|e| StorageError::Database(format!("failed to delete file row: {e}")))?;

    Ok(rows > 0)
}

/// Remove every file row and the `last_built` marker.
///
/// # Errors
///
/// Returns an error if the deletion fails.
pub fn clear_files(conn: &Connection) -> Result<()> {
    conn.execute("DELETE FROM files", [])
        .map_err(|e| StorageError::Database(format!("failed to clear files: {e}")))?;
    conn.execute("DELETE FROM metadata WHERE key = 'last_built'", [])
        .map_err(|e| StorageError::Database(format!("failed to clear metadata: {e}")))?;

    tracing::debug!("Cleared file index");
    Ok(())
}

/// Total number of indexed rows.
///
/// # Errors
///
/// Returns an error if the count query fails.
pub fn file_count(conn: &Connection) -> Result<u64> {
    count_matches(conn, "SELECT COUNT(*) FROM files", [])
}

/// Row count plus the `last_built` timestamp, if any.
///
/// # Errors
///
/// Returns an error if a query fails or the stored timestamp is malformed.
pub fn index_stats(conn: &Connection) -> Result<IndexStats> {
    let file_count = file_count(conn)?;
    let last_built = match get_metadata(conn, "last_built")? {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| StorageError::Corrupt {
                    column: "last_built",
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(IndexStats {
        file_count,
        last_built,
    })
}

/// Set a metadata key.
///
/// # Errors
///
/// Returns an error if the write fails.
pub fn set_metadata(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?, ?)",
        params![key, value],
    )
    .map_err(|e| StorageError::Database(format!("failed to set metadata '{key}': {e}")))?;

    Ok(())
}

/// Read a metadata key.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    let result = conn.query_row("SELECT value FROM metadata WHERE key = ?", [key], |row| {
        row.get(0)
    });

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(format!("failed to get metadata '{key}': {e}")).into()),
    }
}

struct RawRow {
    name: String,
    path: String,
    size: i64,
    mtime: String,
    file_type: String,
    is_directory: bool,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            path: row.get(1)?,
            size: row.get(2)?,
            mtime: row.get(3)?,
            file_type: row.get(4)?,
            is_directory: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<FileRecord> {
        let mtime = DateTime::parse_from_rfc3339(&self.mtime)
            .map_err(|e| StorageError::Corrupt {
                column: "mtime",
                reason: e.to_string(),
            })?
            .with_timezone(&Utc);
        let file_type = FileCategory::parse(&self.file_type).ok_or_else(|| {
            StorageError::Corrupt {
                column: "file_type",
                reason: format!("unknown category '{}'", self.file_type),
            }
        })?;

        Ok(FileRecord {
            name: self.name,
            path: self.path,
            size: u64::try_from(self.size).unwrap_or(0),
            mtime,
            file_type,
            is_directory: self.is_directory,
        })
    }
}

fn query_records<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<FileRecord>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| StorageError::Database(format!("failed to prepare query: {e}")))?;

    let rows = stmt
        .query_map(params, RawRow::from_row)
        .map_err(|e| StorageError::Database(format!("query failed: {e}")))?;

    let mut records = Vec::new();
    for row in rows {
        let raw = row.map_err(|e| StorageError::Database(format!("row read failed: {e}")))?;
        records.push(raw.into_record()?);
    }
    Ok(records)
}

fn count_matches<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<u64> {
    let count: i64 = conn
        .query_row(sql, params, |row| row.get(0))
        .map_err(|e| StorageError::Database(format!("count query failed: {e}")))?;
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Escape LIKE wildcards so the query matches literally.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn like_contains(input: &str) -> String {
    format!("%{}%", escape_like(input))
}

fn like_prefix(input: &str) -> String {
    format!("{}%", escape_like(input))
}

fn unix_now() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(now).unwrap_or_default()
}
