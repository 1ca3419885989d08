//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use quire_engine::{Engine, EngineEvent};
use tokio::sync::mpsc;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// The build engine serving pages.
    pub(crate) engine: Arc<Engine>,
    /// Input of the engine's processing loop.
    pub(crate) events: mpsc::UnboundedSender<EngineEvent>,
    /// Whether the live-reload endpoints are mounted.
    pub(crate) live_reload: bool,
}
