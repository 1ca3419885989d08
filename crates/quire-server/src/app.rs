//! Router construction.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::files;
use crate::live_reload;
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
///
/// Live-reload endpoints are mounted only when enabled; everything that is
/// not an endpoint goes to the page and file fallback.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().route("/@outside/{depth}/{*rest}", get(files::serve_outside));

    if state.live_reload {
        router = router
            .route(quire_render::LIVE_RELOAD_SCRIPT, get(live_reload::client_script))
            .route("/ws/live-reload", get(live_reload::ws_handler));
    }

    let mut router = router.fallback(files::serve_path).with_state(state);
    for layer in security::layers() {
        router = router.layer(layer);
    }
    router.layer(TraceLayer::new_for_http())
}
