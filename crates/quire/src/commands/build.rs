//! `quire build` command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use quire_config::{CliSettings, Config};
use quire_engine::Engine;
use quire_render::{MarkdownTransform, RenderMode};

use super::{engine_config, ensure_project_dir};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover quire.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Output directory for rendered pages (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose output (per-page render logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    /// Render every page once, twice if the first pass changed navigation.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot start or any page failed to
    /// render. Failed pages still get an error page in the output tree.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        ensure_project_dir(&config.docs_resolved.project_dir)?;

        output.info(&format!("Source: {}", config.docs_resolved.source_dir.display()));
        output.info(&format!("Output: {}", config.docs_resolved.output_dir.display()));

        let engine = Engine::start(
            engine_config(&config, RenderMode::Build),
            Arc::new(MarkdownTransform::new()),
        )?;
        let summary = engine.build_all().await;
        engine.shutdown().await;
        let summary = summary?;

        output.build_report(&summary);
        if !summary.failed.is_empty() {
            return Err(CliError::PagesFailed {
                count: summary.failed.len(),
            });
        }
        Ok(())
    }
}
