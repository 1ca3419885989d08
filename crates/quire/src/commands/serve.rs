//! `quire serve` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quire_config::{CliSettings, Config};
use quire_engine::Engine;
use quire_render::{MarkdownTransform, RenderMode};
use quire_server::{ServerConfig, run_server, shutdown_signal};
use tokio::sync::{mpsc, oneshot};

use super::{engine_config, ensure_project_dir};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the serve command.
#[derive(Args)]
pub(crate) struct ServeArgs {
    /// Path to configuration file (default: auto-discover quire.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Output directory for rendered pages (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose output (render timing and watch logs).
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable live reload (default: enabled).
    #[arg(long)]
    live_reload: Option<bool>,

    /// Disable live reload.
    #[arg(long, conflicts_with = "live_reload")]
    no_live_reload: bool,
}

impl ServeArgs {
    /// Execute the serve command.
    ///
    /// Runs the engine's processing loop next to the HTTP server until
    /// Ctrl-C or until the filesystem watch fails for good.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the engine cannot start, or
    /// the server fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let live_reload_enabled = self.resolve_live_reload_enabled();
        let cli_settings = CliSettings {
            host: self.host,
            port: self.port,
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            live_reload_enabled,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        ensure_project_dir(&config.docs_resolved.project_dir)?;

        output.info(&format!(
            "Source directory: {}",
            config.docs_resolved.source_dir.display()
        ));
        output.info(&format!(
            "Output directory: {}",
            config.docs_resolved.output_dir.display()
        ));
        if config.live_reload.enabled {
            output.info("Live reload: enabled");
        } else {
            output.info("Live reload: disabled");
        }

        let mode = if config.live_reload.enabled {
            RenderMode::Serve
        } else {
            RenderMode::Build
        };
        let engine = Arc::new(Engine::start(
            engine_config(&config, mode),
            Arc::new(MarkdownTransform::new()),
        )?);
        let (changes, watch_handle) = engine.watch()?;
        let (events_tx, events) = mpsc::unbounded_channel();

        let (loop_done_tx, loop_done) = oneshot::channel::<()>();
        let loop_engine = Arc::clone(&engine);
        let processing = tokio::spawn(async move {
            let result = loop_engine.run(events, changes).await;
            let _ = loop_done_tx.send(());
            result
        });

        output.highlight(&format!(
            "Serving at http://{}:{}",
            config.server.host, config.server.port
        ));
        let server_config = ServerConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            live_reload_enabled: config.live_reload.enabled,
        };
        let shutdown = async move {
            tokio::select! {
                () = shutdown_signal() => {}
                _ = loop_done => {}
            }
        };
        let served = run_server(Arc::clone(&engine), events_tx, &server_config, shutdown).await;

        engine.shutdown().await;
        watch_handle.stop();
        match processing.await {
            Ok(result) => result?,
            Err(err) => tracing::error!(error = %err, "Processing loop panicked"),
        }
        served?;

        output.success("Server stopped");
        Ok(())
    }

    /// Resolve `live_reload_enabled` from --live-reload/--no-live-reload flags.
    fn resolve_live_reload_enabled(&self) -> Option<bool> {
        self.no_live_reload.then_some(false).or(self.live_reload)
    }
}
