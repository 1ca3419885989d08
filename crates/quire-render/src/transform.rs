//! The transformation seam.
//!
//! The pipeline treats the document-to-HTML step as an opaque function of
//! one source file plus context. [`MarkdownTransform`](crate::MarkdownTransform)
//! is the default implementation; tests and embedders can plug in their own.

use std::path::{Path, PathBuf};

use quire_paths::PathMapper;
use quire_tree::{Navigation, PageMeta};

use crate::error::TransformError;

/// Why a page is being rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Development server: output carries the live-reload client.
    #[default]
    Serve,
    /// Static build.
    Build,
}

/// Everything a transform sees for one page.
#[derive(Debug)]
pub struct TransformInput<'a> {
    /// Absolute source path.
    pub source: &'a Path,
    /// Source path relative to the input directory.
    pub source_rel: &'a Path,
    /// Path mapping for the current input/output roots.
    pub mapper: &'a PathMapper,
    /// Render mode.
    pub mode: RenderMode,
    /// Navigation snapshot taken when the render was requested.
    pub navigation: &'a Navigation,
}

/// Result of a successful transform.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransformOutput {
    /// Complete HTML document.
    pub html: String,
    /// Navigation metadata for the page tree.
    pub meta: PageMeta,
    /// Absolute paths of files this page was built from, besides its own
    /// source.
    pub dependencies: Vec<PathBuf>,
}

/// Document-to-HTML transformation.
///
/// Implementations run on pool worker threads and must be shareable. A
/// panic inside `transform` is caught by the pipeline and rendered as an
/// error page.
pub trait Transform: Send + Sync {
    /// Transform one page.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] if the page cannot be rendered.
    fn transform(&self, input: &TransformInput<'_>) -> Result<TransformOutput, TransformError>;
}
