//! Messages in and out of the engine.

use std::path::PathBuf;

use quire_watch::{ChannelId, FileChange};

/// One input to the engine's processing loop.
///
/// Every event is handled as one serialized step: no two steps interleave
/// their updates to the page set, dependency edges or page tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// A debounced filesystem change.
    FileChanged(FileChange),
    /// A live channel started displaying a page.
    SubscriptionAdded {
        /// Channel identity.
        channel: ChannelId,
        /// Absolute source path of the displayed page.
        page: PathBuf,
    },
    /// A live channel closed.
    SubscriptionRemoved {
        /// Channel identity.
        channel: ChannelId,
    },
}

/// "Content updated" signal for one page.
///
/// Sent only after the page's output has been written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReloadEvent {
    /// Absolute source path of the page.
    pub page: PathBuf,
    /// URL the page is served at.
    pub url: String,
}
