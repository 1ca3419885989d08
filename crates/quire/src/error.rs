//! CLI error types.

use quire_config::ConfigError;
use quire_engine::{EngineError, StartupError};
use quire_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Startup(#[from] StartupError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("{count} page(s) failed to render")]
    PagesFailed { count: usize },
}
