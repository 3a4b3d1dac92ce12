//! Filesystem traversal and the parallel scan engine.
//!
//! [`walker`] holds the shallow and deep walks plus the match filters,
//! [`pool`] fans a scan out over top-level subdirectories, and
//! [`record`] is the wire shape every walk produces.

pub mod pool;
pub mod record;
pub mod walker;

pub use pool::{available_workers, parallel_scan, parallel_scan_async, partition, FanOut};
pub use record::FileRecord;
pub use walker::{ScanFilter, WalkMode, WalkTask};
