//! HTTP server for the Quire documentation engine.
//!
//! Serves pages rendered on demand by [`quire_engine::Engine`], static files
//! from the output and source trees, and the live-reload endpoints:
//!
//! ```text
//! Browser ──HTTP──► axum router (quire-server)
//!                        │
//!                        ├─► page URL ──► Engine::ensure_rendered ──► output file
//!                        │
//!                        ├─► /ws/live-reload ──► EngineEvent::Subscription*
//!                        │        ▲
//!                        │        └── ReloadEvent broadcast
//!                        │
//!                        └─► static files (output tree, source assets, /@outside)
//! ```

mod app;
mod error;
mod files;
mod live_reload;
mod middleware;
mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use quire_engine::{Engine, EngineEvent};
use tokio::sync::mpsc;

pub use error::ServerError;
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Mount the live-reload endpoints.
    pub live_reload_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7979,
            live_reload_enabled: true,
        }
    }
}

/// Serve `engine` until `shutdown` resolves.
///
/// Subscription changes from live-reload sockets are sent to `events`,
/// which should feed [`Engine::run`].
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener fails.
pub async fn run_server(
    engine: Arc<Engine>,
    events: mpsc::UnboundedSender<EngineEvent>,
    config: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ServerError::Address { address, source })?;

    let state = Arc::new(AppState {
        engine,
        events,
        live_reload: config.live_reload_enabled,
    });
    let app = app::create_router(state);

    tracing::info!(address = %addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    Ok(())
}

/// Resolve on Ctrl-C.
///
/// If the handler cannot be installed the future never resolves.
pub async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}

#[cfg(test)]
mod tests {
    use std::fs;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use pretty_assertions::assert_eq;
    use quire_engine::EngineConfig;
    use quire_render::MarkdownTransform;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    struct Site {
        _temp: TempDir,
        engine: Arc<Engine>,
        router: Router,
    }

    fn site(files: &[(&str, &str)], live_reload: bool) -> Site {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(root.join("docs")).unwrap();

        let config = EngineConfig::new(root.join("docs"), root.join(".quire/site")).with_workers(1);
        let engine = Arc::new(Engine::start(config, Arc::new(MarkdownTransform::new())).unwrap());
        let (events, _) = mpsc::unbounded_channel();
        let router = app::create_router(Arc::new(AppState {
            engine: Arc::clone(&engine),
            events,
            live_reload,
        }));
        Site {
            _temp: temp,
            engine,
            router,
        }
    }

    async fn get(router: &Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_page_is_rendered_on_request() {
        let site = site(&[("docs/guide.md", "# Guide\n\nHello.")], true);

        let (status, headers, body) = get(&site.router, "/guide").await;

        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert!(body.contains("Hello."));
        assert!(body.contains(quire_render::LIVE_RELOAD_SCRIPT));
        assert!(site.engine.mapper().output_dir().join("guide.html").is_file());
    }

    #[tokio::test]
    async fn test_security_headers_on_every_response() {
        let site = site(&[], false);

        let (status, headers, _) = get(&site.router, "/missing").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "no-referrer");
        assert!(headers.contains_key("content-security-policy"));
    }

    #[tokio::test]
    async fn test_live_reload_endpoints_follow_config() {
        let enabled = site(&[], true);
        let disabled = site(&[], false);

        let (status, headers, body) = get(&enabled.router, quire_render::LIVE_RELOAD_SCRIPT).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/javascript"));
        assert!(body.contains("/ws/live-reload"));

        let (status, _, _) = get(&disabled.router, quire_render::LIVE_RELOAD_SCRIPT).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_source_assets_served_but_not_markdown() {
        let site = site(&[("docs/guide.md", "# Guide"), ("docs/img/logo.svg", "<svg/>")], true);

        let (status, _, body) = get(&site.router, "/img/logo.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg/>");

        let (status, _, _) = get(&site.router, "/guide.md").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_outside_assets_are_sandboxed() {
        let site = site(&[("shared/diagram.svg", "<svg/>"), (".env", "SECRET=1")], true);

        let (status, _, body) = get(&site.router, "/@outside/1/shared/diagram.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg/>");

        let (status, _, _) = get(&site.router, "/@outside/1/.env").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = get(&site.router, "/@outside/1/../etc/passwd").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_encoded_paths_are_decoded() {
        let site = site(
            &[
                ("docs/my page.md", "# Spaced\n\nFound me."),
                ("docs/img/team photo.svg", "<svg/>"),
                ("shared/wide diagram.svg", "<svg/>"),
                (".env", "SECRET=1"),
            ],
            true,
        );

        let (status, _, body) = get(&site.router, "/my%20page").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Found me."));

        let (status, _, body) = get(&site.router, "/img/team%20photo.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg/>");

        let (status, _, _) = get(&site.router, "/@outside/1/shared/wide%20diagram.svg").await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = get(&site.router, "/@outside/1/%2Eenv").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = get(&site.router, "/%2E%2E/.env").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_unavailable() {
        let site = site(&[("docs/index.md", "# Home")], true);
        site.engine.shutdown().await;

        let (status, _, _) = get(&site.router, "/").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_invalid_address_is_rejected() {
        let site = site(&[], false);
        let (events, _) = mpsc::unbounded_channel();
        let config = ServerConfig {
            host: "not a host".to_owned(),
            ..ServerConfig::default()
        };

        let err = run_server(Arc::clone(&site.engine), events, &config, async {})
            .await
            .unwrap_err();

        assert!(matches!(err, ServerError::Address { .. }));
    }
}
