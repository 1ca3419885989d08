//! Live channel subscriptions.
//!
//! Each open browser tab holds one live channel that displays exactly one
//! page. A page may be displayed by many channels. The registry is the only
//! owner of these edges; other components go through its methods.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

/// Identity of a live channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId(Uuid);

impl ChannelId {
    /// Allocate a fresh channel id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
struct Inner {
    by_channel: HashMap<ChannelId, PathBuf>,
    by_page: BTreeMap<PathBuf, BTreeSet<ChannelId>>,
}

impl Inner {
    fn detach(&mut self, channel: ChannelId) -> Option<PathBuf> {
        let page = self.by_channel.remove(&channel)?;
        if let Some(channels) = self.by_page.get_mut(&page) {
            channels.remove(&channel);
            if channels.is_empty() {
                self.by_page.remove(&page);
            }
        }
        Some(page)
    }
}

/// Registry of live channels keyed by the page they display.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `channel` as displaying `page`.
    ///
    /// A channel displays one page at a time, so re-adding a channel moves it
    /// to the new page. Returns the page it was displaying before, if any.
    pub fn add(&self, channel: ChannelId, page: PathBuf) -> Option<PathBuf> {
        let mut inner = self.lock();
        let previous = inner.detach(channel);
        inner.by_page.entry(page.clone()).or_default().insert(channel);
        inner.by_channel.insert(channel, page);
        previous
    }

    /// Unregister `channel`.
    ///
    /// Safe to call for channels that were never registered (e.g., a
    /// disconnect racing the initial subscribe). Returns the page the channel
    /// was displaying.
    pub fn remove(&self, channel: ChannelId) -> Option<PathBuf> {
        self.lock().detach(channel)
    }

    /// Channels currently displaying `page`.
    #[must_use]
    pub fn channels_for(&self, page: &Path) -> Vec<ChannelId> {
        self.lock()
            .by_page
            .get(page)
            .map(|channels| channels.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether any channel displays `page`.
    #[must_use]
    pub fn is_subscribed(&self, page: &Path) -> bool {
        self.lock().by_page.contains_key(page)
    }

    /// All pages displayed by at least one channel, sorted by path.
    #[must_use]
    pub fn subscribed_pages(&self) -> Vec<PathBuf> {
        self.lock().by_page.keys().cloned().collect()
    }

    /// Number of registered channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().by_channel.len()
    }

    /// Whether no channels are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_add_and_lookup() {
        let registry = SubscriptionRegistry::new();
        let channel = ChannelId::new();
        let page = PathBuf::from("/docs/a.md");

        assert_eq!(registry.add(channel, page.clone()), None);

        assert!(registry.is_subscribed(&page));
        assert_eq!(registry.channels_for(&page), vec![channel]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_many_channels_one_page() {
        let registry = SubscriptionRegistry::new();
        let page = PathBuf::from("/docs/a.md");
        let first = ChannelId::new();
        let second = ChannelId::new();

        registry.add(first, page.clone());
        registry.add(second, page.clone());
        registry.remove(first);

        assert_eq!(registry.channels_for(&page), vec![second]);
        assert!(registry.is_subscribed(&page));
    }

    #[test]
    fn test_readd_moves_channel() {
        let registry = SubscriptionRegistry::new();
        let channel = ChannelId::new();
        let a = PathBuf::from("/docs/a.md");
        let b = PathBuf::from("/docs/b.md");

        registry.add(channel, a.clone());
        let previous = registry.add(channel, b.clone());

        assert_eq!(previous, Some(a.clone()));
        assert!(!registry.is_subscribed(&a));
        assert_eq!(registry.subscribed_pages(), vec![b]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_channel_is_noop() {
        let registry = SubscriptionRegistry::new();

        assert_eq!(registry.remove(ChannelId::new()), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_twice() {
        let registry = SubscriptionRegistry::new();
        let channel = ChannelId::new();
        registry.add(channel, PathBuf::from("/docs/a.md"));

        assert!(registry.remove(channel).is_some());
        assert!(registry.remove(channel).is_none());
        assert!(registry.subscribed_pages().is_empty());
    }

    #[test]
    fn test_channel_ids_are_unique() {
        assert_ne!(ChannelId::new(), ChannelId::new());
    }
}
