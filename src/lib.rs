//! findex library
//!
//! Directory-tree file server with a SQLite-backed search index, a parallel
//! filesystem scanner, and a debounced watcher that keeps the index current.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod classify;
pub mod config;
pub mod error;
pub mod index;
pub mod scan;
pub mod server;
pub mod storage;
pub mod watcher;

pub use classify::FileCategory;
pub use config::Config;
pub use error::{Error, Result};
pub use index::{BuildOutcome, IndexStatus, Indexer};
pub use scan::{FileRecord, ScanFilter};
pub use storage::Database;
pub use watcher::{FileWatcher, WatchOptions, WatcherStatus};
