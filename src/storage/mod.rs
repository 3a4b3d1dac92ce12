//! `SQLite`-backed persistent file index.
//!
//! This module provides the queryable store behind search and image
//! discovery: one `files` row per indexed path plus a small `metadata`
//! key/value table.

mod connection;
mod files;
mod schema;

pub use connection::Database;
pub use files::{
    clear_files, delete_file, file_count, find_images, find_images_page, get_metadata,
    index_stats, search_files, search_files_page, set_metadata, upsert_files, FilePage,
    IndexStats, IMAGE_RESULT_CAP, SEARCH_RESULT_CAP,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;

        tracing::info!("Storage initialized, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
