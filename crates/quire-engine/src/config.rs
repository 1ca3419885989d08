//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use quire_render::{PipelineConfig, PluginDescriptor, RenderMode};

/// Name of the page-tree file when none is configured.
pub const DEFAULT_TREE_FILE: &str = "page-tree.json";

/// Everything the engine needs to run.
///
/// Paths may be relative; [`Engine::start`](crate::Engine::start) resolves
/// them against the current directory.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Root of the source tree.
    pub source_dir: PathBuf,
    /// Root of the output tree.
    pub output_dir: PathBuf,
    /// Persisted page tree.
    pub tree_file: PathBuf,
    /// Glob patterns, relative to `source_dir`, that select pages.
    pub page_patterns: Vec<String>,
    /// Directory watched for changes. Usually `source_dir` or the project
    /// root when pages include files from outside the source tree.
    pub watch_root: PathBuf,
    /// Extra subtrees whose changes are ignored. The output directory and
    /// the tree file are always ignored.
    pub watch_ignore: Vec<PathBuf>,
    /// Debounce window for filesystem events.
    pub debounce: Duration,
    /// Render pool settings.
    pub pipeline: PipelineConfig,
    /// Render mode for every page.
    pub mode: RenderMode,
    /// Plugins whose public assets are copied into the output tree.
    pub plugins: Vec<PluginDescriptor>,
}

impl EngineConfig {
    /// Configuration with defaults for everything but the two roots.
    ///
    /// The tree file is placed next to the output directory and the source
    /// directory is watched.
    #[must_use]
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        let output_dir = output_dir.into();
        let tree_file = output_dir
            .parent()
            .map_or_else(|| PathBuf::from(DEFAULT_TREE_FILE), |dir| dir.join(DEFAULT_TREE_FILE));
        Self {
            watch_root: source_dir.clone(),
            source_dir,
            output_dir,
            tree_file,
            page_patterns: vec!["**/*.md".to_owned()],
            watch_ignore: Vec::new(),
            debounce: Duration::from_millis(50),
            pipeline: PipelineConfig::default(),
            mode: RenderMode::Serve,
            plugins: Vec::new(),
        }
    }

    /// Set the render mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of render workers.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.pipeline.workers = workers;
        self
    }

    /// Set the persisted tree file.
    #[must_use]
    pub fn with_tree_file(mut self, tree_file: impl Into<PathBuf>) -> Self {
        self.tree_file = tree_file.into();
        self
    }
}
