//! Watch event types.
//!
//! Raw filesystem changes travel from the watch thread to the engine as
//! [`WatchNotice`]s. Classification against the dependency graph turns a
//! [`FileChange`] into zero or more [`WatchEvent`]s.

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::WatchError;

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File was created.
    Created,
    /// File was modified.
    Modified,
    /// File was removed.
    Removed,
}

/// A debounced filesystem change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    /// Absolute, normalized path of the changed file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

/// Semantic event produced by classifying a [`FileChange`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// The page is open in at least one channel and its source or one of its
    /// dependencies changed. It must be re-rendered and its channels notified.
    PageChanged {
        /// Source path of the page.
        page: PathBuf,
    },
    /// The page is not open anywhere but its output is stale. Its output
    /// should be invalidated without rendering.
    DependencyOnlyChanged {
        /// Source path of the page whose output is stale.
        page: PathBuf,
        /// File whose change made it stale (the page itself for own edits).
        changed: PathBuf,
    },
    /// The page's source file was removed from disk.
    PageDeleted {
        /// Source path of the removed page.
        page: PathBuf,
    },
}

impl WatchEvent {
    /// Source path of the page this event is about.
    #[must_use]
    pub fn page(&self) -> &PathBuf {
        match self {
            Self::PageChanged { page }
            | Self::DependencyOnlyChanged { page, .. }
            | Self::PageDeleted { page } => page,
        }
    }
}

/// Message sent from the watch thread.
#[derive(Debug)]
pub enum WatchNotice {
    /// A debounced change.
    Changed(FileChange),
    /// The backend failed and was re-established; these changes were found
    /// by the recovery rescan.
    Rescanned(Vec<FileChange>),
    /// The backend failed and recovery did not succeed. No further notices
    /// will arrive.
    Fatal(WatchError),
}

/// Receiver for watch notices.
#[derive(Debug)]
pub struct ChangeReceiver {
    rx: mpsc::UnboundedReceiver<WatchNotice>,
}

impl ChangeReceiver {
    /// Create a new receiver from a channel receiver.
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<WatchNotice>) -> Self {
        Self { rx }
    }

    /// Create a connected sender/receiver pair.
    ///
    /// Useful for driving the engine loop from something other than a live
    /// filesystem watch.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<WatchNotice>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Wait for the next notice.
    ///
    /// Returns `None` when the watch thread has stopped.
    pub async fn recv(&mut self) -> Option<WatchNotice> {
        self.rx.recv().await
    }

    /// Try to receive a notice without waiting.
    pub fn try_recv(&mut self) -> Option<WatchNotice> {
        self.rx.try_recv().ok()
    }
}

/// Handle to stop watching.
///
/// Dropping the handle stops the watch thread and releases the backend.
#[derive(Debug)]
pub struct WatchHandle {
    _shutdown: Option<std::sync::mpsc::Sender<()>>,
}

impl WatchHandle {
    /// Create a new watch handle with a shutdown signal sender.
    ///
    /// When the handle is dropped the sender is dropped, which the watch
    /// thread observes as a disconnect.
    pub(crate) fn new(shutdown: std::sync::mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately.
    pub fn stop(mut self) {
        self._shutdown.take();
    }
}
