//! Page dependency tracking and filesystem watching for Quire.
//!
//! This crate owns the live set of pages, the dependency edges recorded by
//! each render, and the open live channels displaying each page. It turns raw
//! filesystem changes into a small set of semantic events:
//!
//! - [`WatchEvent::PageChanged`]: an open page must re-render and reload
//! - [`WatchEvent::DependencyOnlyChanged`]: a closed page's output is stale
//! - [`WatchEvent::PageDeleted`]: a page's source is gone
//!
//! # Architecture
//!
//! - [`DependencyWatcher`] publishes the [`DependencyGraph`] as an `Arc`
//!   snapshot. Every mutation swaps in a new snapshot, so classification
//!   never sees a torn dependency set.
//! - [`SubscriptionRegistry`] maps live channels to pages.
//! - [`watch`] runs a `notify` backend feeding a per-path debouncer. A drain
//!   thread forwards settled changes to a [`ChangeReceiver`] and recovers
//!   from backend failures with a rescan.
//!
//! # Example
//!
//! ```ignore
//! use quire_watch::{DependencyWatcher, PageMatcher, WatchOptions, scan_pages, watch};
//!
//! let matcher = PageMatcher::new(&docs, &["**/*.md".to_owned()])?;
//! let deps = DependencyWatcher::new(matcher);
//! deps.add_pages(scan_pages(deps.matcher()));
//!
//! let (mut changes, _handle) = watch(&root, WatchOptions::default())?;
//! while let Some(notice) = changes.recv().await {
//!     // classify and dispatch
//! }
//! ```

mod debouncer;
mod error;
mod event;
mod graph;
mod scan;
mod subscriptions;
mod watcher;

pub use error::WatchError;
pub use event::{ChangeKind, ChangeReceiver, FileChange, WatchEvent, WatchHandle, WatchNotice};
pub use graph::{DependencyGraph, Page};
pub use scan::{PageMatcher, scan_pages};
pub use subscriptions::{ChannelId, SubscriptionRegistry};
pub use watcher::{DependencyWatcher, MAX_DEBOUNCE, WatchOptions, watch};
