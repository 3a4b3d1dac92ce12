//! Live index maintenance driven by filesystem notifications.
//!
//! [`FileWatcher`] registers non-recursive OS watches over the served tree,
//! debounces the raw event stream, and applies settled changes to the file
//! index one path at a time.

pub mod debounce;
pub mod filter;
#[allow(clippy::module_inception)]
pub mod watcher;

pub use debounce::{DebounceKey, DebounceKind, Debouncer};
pub use filter::IgnorePatterns;
pub use watcher::{FileWatcher, WatchOptions, WatchStats, WatchStatsSnapshot, WatcherStatus};
