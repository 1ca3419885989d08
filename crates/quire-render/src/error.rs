//! Render error types.

use std::io;
use std::path::PathBuf;

/// A transformation of one page failed.
///
/// Never propagated past the page: the pipeline renders it into the page's
/// output instead.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The source file could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// Source path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Front matter is not valid YAML for the expected fields.
    #[error("Invalid front matter in {}: {source}", .path.display())]
    FrontMatter {
        /// Source path.
        path: PathBuf,
        /// Underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },
    /// Any other failure reported by a transform.
    #[error("{0}")]
    Failed(String),
}

/// Error from the render pool itself.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A worker thread could not be started. Fatal at startup.
    #[error("Failed to start render worker: {0}")]
    Spawn(#[source] io::Error),
    /// The pipeline was shut down.
    #[error("Render pipeline is shut down")]
    ShutDown,
    /// The worker handling the job went away without replying.
    #[error("Render worker exited before replying")]
    WorkerLost,
    /// The source file is not under the input directory.
    #[error("Source {} is outside the input directory", .path.display())]
    OutsideInput {
        /// Source path.
        path: PathBuf,
    },
    /// The output file could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// The output directory could not be prepared. Fatal at startup.
#[derive(Debug, thiserror::Error)]
#[error("Cannot create output directory {}: {source}", .path.display())]
pub struct PrepareError {
    /// Output directory.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_error_display() {
        let err = TransformError::Read {
            path: PathBuf::from("/docs/a.md"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };

        assert_eq!(err.to_string(), "Failed to read /docs/a.md: gone");
    }

    #[test]
    fn test_pipeline_error_display() {
        assert_eq!(
            PipelineError::ShutDown.to_string(),
            "Render pipeline is shut down"
        );
        assert_eq!(
            PipelineError::OutsideInput {
                path: PathBuf::from("/elsewhere/a.md"),
            }
            .to_string(),
            "Source /elsewhere/a.md is outside the input directory"
        );
    }

    #[test]
    fn test_errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TransformError>();
        assert_send_sync::<PipelineError>();
        assert_send_sync::<PrepareError>();
    }
}
