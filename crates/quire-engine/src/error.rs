//! Engine error types.

use std::path::PathBuf;

use quire_render::{PipelineError, PrepareError};
use quire_watch::WatchError;

/// The engine cannot start or keep running. Aborts the process.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The output directory cannot be created.
    #[error("{0}")]
    OutputDir(#[from] PrepareError),
    /// The filesystem watch cannot be started, or failed beyond recovery.
    #[error("{0}")]
    Watch(#[from] WatchError),
    /// The render pool cannot be started.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
}

/// A single engine operation failed. The engine keeps running.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The path is not a page of this site.
    #[error("Not a page: {}", .path.display())]
    NotAPage {
        /// Requested source path.
        path: PathBuf,
    },
    /// The render pool could not complete the request.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),
    /// The engine was shut down.
    #[error("Engine is shut down")]
    ShutDown,
}
