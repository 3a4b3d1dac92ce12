//! Per-event debouncing.
//!
//! Raw filesystem notifications arrive in bursts (an editor save can emit a
//! create, several modifies, and a metadata change in a few milliseconds).
//! Each `(kind, path)` pair gets its own timer; every new occurrence re-arms
//! it, and handling runs only after a full quiet interval.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Coarse event class used for debounce keying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebounceKind {
    Create,
    Modify,
    Remove,
    Other,
}

impl DebounceKind {
    /// Map a raw notify kind; access-only events are dropped entirely.
    #[must_use]
    pub fn from_event(kind: &notify::EventKind) -> Option<Self> {
        match kind {
            notify::EventKind::Create(_) => Some(Self::Create),
            notify::EventKind::Modify(_) => Some(Self::Modify),
            notify::EventKind::Remove(_) => Some(Self::Remove),
            notify::EventKind::Access(_) => None,
            notify::EventKind::Any | notify::EventKind::Other => Some(Self::Other),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Remove => "remove",
            Self::Other => "other",
        }
    }
}

/// Identity of a pending change: what happened, and where.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebounceKey {
    pub kind: DebounceKind,
    pub path: PathBuf,
}

impl DebounceKey {
    #[must_use]
    pub fn new(kind: DebounceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Timer table for pending keys. Fired keys come back on the channel given
/// at construction; the owner must call [`Debouncer::complete`] when it
/// receives one.
pub struct Debouncer {
    quiet: Duration,
    fire_tx: mpsc::Sender<DebounceKey>,
    timers: HashMap<DebounceKey, JoinHandle<()>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(quiet: Duration, fire_tx: mpsc::Sender<DebounceKey>) -> Self {
        Self {
            quiet,
            fire_tx,
            timers: HashMap::new(),
        }
    }

    /// Arm (or re-arm) the timer for a key.
    pub fn arm(&mut self, key: DebounceKey) {
        if let Some(previous) = self.timers.remove(&key) {
            previous.abort();
        }

        let fire_tx = self.fire_tx.clone();
        let quiet = self.quiet;
        let fired = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = fire_tx.send(fired).await;
        });
        self.timers.insert(key, handle);
    }

    /// Forget a key whose timer has fired.
    pub fn complete(&mut self, key: &DebounceKey) {
        self.timers.remove(key);
    }

    /// Abort every pending timer.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Number of keys still waiting out their quiet interval.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
