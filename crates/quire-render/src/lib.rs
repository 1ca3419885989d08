//! Isolated page rendering for Quire.
//!
//! A [`RenderPipeline`] runs an opaque [`Transform`] on a pool of worker
//! threads and writes each result to the output tree atomically. A transform
//! that fails or panics never takes the caller down: the failure is rendered
//! into an error page at the page's output path and reported as
//! [`RenderStatus::Failed`].
//!
//! [`MarkdownTransform`] is the default transform. It handles YAML front
//! matter, `::include[path]` directives (reported as dependencies), link and
//! image rewriting for assets outside the source root, and the page layout
//! with navigation and the live-reload client.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quire_render::{
//!     MarkdownTransform, PipelineConfig, RenderMode, RenderPipeline, RenderRequest,
//! };
//!
//! let transform = Arc::new(MarkdownTransform::new());
//! let pipeline = RenderPipeline::start(transform, PipelineConfig::default())?;
//! let outcome = pipeline
//!     .render(RenderRequest {
//!         file_path: docs.join("guide/setup.md"),
//!         input_dir: docs.clone(),
//!         output_dir: out.clone(),
//!         mode: RenderMode::Serve,
//!         navigation: Arc::new(tree.navigation()),
//!     })
//!     .await?;
//! ```

mod error;
mod markdown;
mod output;
mod pipeline;
mod plugin;
mod transform;

pub use error::{PipelineError, PrepareError, TransformError};
pub use markdown::MarkdownTransform;
pub use markdown::page::{LIVE_RELOAD_SCRIPT, render_error_page};
pub use output::{prepare_output, write_atomic};
pub use pipeline::{PipelineConfig, RenderOutcome, RenderPipeline, RenderRequest, RenderStatus};
pub use plugin::PluginDescriptor;
pub use transform::{RenderMode, Transform, TransformInput, TransformOutput};
