//! Watch error types.

use std::path::PathBuf;

/// Error from the filesystem watch.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notification backend failed (e.g., inotify watch or handle
    /// exhaustion).
    #[error("Watch backend error on {}: {source}", .root.display())]
    Backend {
        /// Watched root.
        root: PathBuf,
        /// Underlying backend error.
        #[source]
        source: notify::Error,
    },
    /// Recovery rescan after a backend failure could not walk the tree.
    #[error("Rescan of {} failed: {source}", .root.display())]
    Rescan {
        /// Watched root.
        root: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Invalid page glob pattern.
    #[error("Invalid page pattern {pattern:?}: {source}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Underlying glob error.
        #[source]
        source: glob::PatternError,
    },
}
