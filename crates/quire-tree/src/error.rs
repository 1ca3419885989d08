//! Page tree error types.

use std::io;
use std::path::PathBuf;

/// Error reading the persisted tree file.
///
/// Never fatal: [`PageTree::restore`](crate::PageTree::restore) logs it and
/// starts from an empty tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeLoadError {
    /// The file exists but could not be read.
    #[error("Failed to read page tree {}: {source}", .path.display())]
    Io {
        /// Tree file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The file is not a valid tree document.
    #[error("Malformed page tree {}: {source}", .path.display())]
    Parse {
        /// Tree file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The file was written by an incompatible format version.
    #[error("Page tree {} has version {found}, expected {expected}", .path.display())]
    Version {
        /// Tree file path.
        path: PathBuf,
        /// Version found in the file.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },
}

/// Error persisting the tree file.
#[derive(Debug, thiserror::Error)]
pub enum TreeSaveError {
    /// Writing or renaming the file failed.
    #[error("Failed to write page tree {}: {source}", .path.display())]
    Io {
        /// Tree file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Serialization failed.
    #[error("Failed to serialize page tree: {0}")]
    Serialize(#[from] serde_json::Error),
}
