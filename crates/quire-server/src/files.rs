//! Page and file serving.
//!
//! Request paths resolve in this order:
//!
//! 1. a page URL, rendered on demand
//! 2. a file already in the output tree (plugin assets, copied files)
//! 3. a non-page file in the source tree (images next to pages)
//!
//! Outside-root assets have their own route. Paths are percent-decoded
//! before any lookup.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use quire_engine::EngineError;

use crate::state::AppState;

/// Fallback handler for everything that is not an endpoint.
pub(crate) async fn serve_path(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let Some(path) = decode_path(&uri) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path = path.as_ref();

    if let Some(source) = state.engine.resolve_url(path) {
        return match state.engine.ensure_rendered(&source).await {
            Ok(output) => serve_file(&output).await,
            Err(EngineError::ShutDown) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
            Err(err) => {
                tracing::error!(page = %source.display(), error = %err, "Failed to render page");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    let mapper = state.engine.mapper();
    if let Some(file) = safe_join(mapper.output_dir(), path).filter(|p| p.is_file()) {
        return serve_file(&file).await;
    }
    if let Some(file) = safe_join(mapper.source_dir(), path)
        .filter(|p| p.is_file() && !is_page_source(p))
    {
        return serve_file(&file).await;
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Serve an asset referenced from above the source root.
pub(crate) async fn serve_outside(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let Some(path) = decode_path(&uri).filter(|p| !has_hidden_segment(p)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match state.engine.mapper().resolve_outside_url(&path) {
        Some(file) if file.is_file() => serve_file(&file).await,
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from(bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            StatusCode::NOT_FOUND.into_response()
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "Failed to read file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Percent-decoded request path; `None` if it is not valid UTF-8.
fn decode_path(uri: &Uri) -> Option<Cow<'_, str>> {
    percent_decode_str(uri.path()).decode_utf8().ok()
}

/// Join a URL path onto `root`, refusing traversal and hidden entries.
fn safe_join(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut pushed = false;
    for segment in url_path.split('/').filter(|s| !s.is_empty()) {
        if segment.starts_with('.') || segment.contains('\\') {
            return None;
        }
        path.push(segment);
        pushed = true;
    }
    pushed.then_some(path)
}

fn has_hidden_segment(url_path: &str) -> bool {
    url_path.split('/').any(|s| s.starts_with('.'))
}

/// Markdown sources are never served raw.
fn is_page_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}
