//! Per-path event coalescing.
//!
//! Editors that save on every keystroke, or save via "write temp + rename",
//! emit bursts of raw events for one logical edit. The debouncer folds each
//! burst into a single [`FileChange`] per path, emitted once the path has
//! been quiet for the debounce window.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::event::{ChangeKind, FileChange};

/// Pending change waiting to be emitted.
struct PendingChange {
    kind: ChangeKind,
    deadline: Instant,
}

/// Thread-safe change debouncer.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, PendingChange>>,
    debounce_duration: Duration,
}

impl EventDebouncer {
    /// Create a new debouncer with the specified debounce window.
    pub fn new(debounce_duration: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            debounce_duration,
        }
    }

    /// Record a raw change.
    ///
    /// Called from the notify callback thread.
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.debounce_duration;

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(PendingChange { kind, deadline });
            }
            Entry::Occupied(mut entry) => {
                if let Some(coalesced) = Self::coalesce(entry.get().kind, kind) {
                    let change = entry.get_mut();
                    change.kind = coalesced;
                    change.deadline = deadline;
                } else {
                    entry.remove();
                }
            }
        }
    }

    /// Coalesce two change kinds.
    ///
    /// Returns `None` if both changes cancel out (created then removed).
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
        use ChangeKind::{Created, Modified, Removed};

        match (existing, new) {
            (Created, Created) => Some(Created),
            (Created, Modified) => Some(Created),
            // Never existed as far as consumers are concerned
            (Created, Removed) => None,

            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Removed) => Some(Removed),

            // Replaced in place (atomic save)
            (Removed, Created) => Some(Modified),
            (Removed, Modified) => Some(Removed),
            (Removed, Removed) => Some(Removed),
        }
    }

    /// Drain changes whose debounce deadline has passed.
    ///
    /// Returned changes are sorted by path.
    pub fn drain_ready(&self) -> Vec<FileChange> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let mut ready_paths: Vec<PathBuf> = pending
            .iter()
            .filter(|(_, change)| change.deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        ready_paths.sort();

        ready_paths
            .into_iter()
            .filter_map(|path| {
                let change = pending.remove(&path)?;
                Some(FileChange {
                    path,
                    kind: change.kind,
                })
            })
            .collect()
    }

    /// Drop all pending changes.
    ///
    /// Used before a recovery rescan, which recomputes changes from disk.
    pub fn clear(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
