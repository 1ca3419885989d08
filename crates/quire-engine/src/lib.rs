//! Incremental documentation build engine for Quire.
//!
//! The [`Engine`] ties the pieces together:
//!
//! - pages and their dependency edges (`quire-watch`)
//! - the persisted navigation tree (`quire-tree`)
//! - the isolated render pool (`quire-render`)
//!
//! It runs a single ordered processing loop over [`EngineEvent`]s. A file
//! change is classified into page-level events; open pages re-render and
//! their live channels get a [`ReloadEvent`], closed pages only have their
//! output invalidated. On-demand requests go through
//! [`Engine::ensure_rendered`].
//!
//! # Convergence
//!
//! Rendering a page can change the navigation tree (a new page, a changed
//! title or order). When saving the tree reports a structural change, the
//! page that caused it is rendered once more and every other open page is
//! re-rendered once, sequentially. Closed pages are flagged and re-render on
//! their next request. The cascade never recurses.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quire_engine::{Engine, EngineConfig};
//! use quire_render::MarkdownTransform;
//!
//! let config = EngineConfig::new("docs", ".quire/site");
//! let engine = Engine::start(config, Arc::new(MarkdownTransform::new()))?;
//! let (changes, _handle) = engine.watch()?;
//! let (events_tx, events) = tokio::sync::mpsc::unbounded_channel();
//! engine.run(events, changes).await?;
//! ```

mod config;
mod engine;
mod error;
mod event;

pub use config::{DEFAULT_TREE_FILE, EngineConfig};
pub use engine::{BuildSummary, Engine};
pub use error::{EngineError, StartupError};
pub use event::{EngineEvent, ReloadEvent};
