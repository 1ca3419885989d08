//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod serve;

use std::path::Path;
use std::time::Duration;

use quire_config::Config;
use quire_engine::EngineConfig;
use quire_render::{PluginDescriptor, RenderMode};

use crate::error::CliError;

pub(crate) use build::BuildArgs;
pub(crate) use serve::ServeArgs;

/// Engine settings for a loaded configuration.
pub(crate) fn engine_config(config: &Config, mode: RenderMode) -> EngineConfig {
    let docs = &config.docs_resolved;
    let watch = &config.watch_resolved;

    let mut engine = EngineConfig::new(docs.source_dir.clone(), docs.output_dir.clone())
        .with_mode(mode)
        .with_workers(config.render.workers())
        .with_tree_file(docs.tree_file());
    engine.page_patterns.clone_from(&docs.page_patterns);
    engine.watch_root.clone_from(&watch.root);
    engine.watch_ignore.clone_from(&watch.ignore);
    engine.debounce = Duration::from_millis(watch.debounce_ms);
    engine.plugins = config
        .plugins_resolved
        .iter()
        .map(|plugin| {
            let descriptor = PluginDescriptor::new(plugin.name.as_str());
            match &plugin.public_folder {
                Some(folder) => descriptor.with_public_folder(folder.clone()),
                None => descriptor,
            }
        })
        .collect();
    engine
}

/// Ensure the `.quire/` project directory exists with a `.gitignore`.
pub(crate) fn ensure_project_dir(project_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(project_dir)?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by quire\n*\n");
    }

    Ok(())
}
