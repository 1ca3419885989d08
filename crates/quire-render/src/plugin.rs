//! Plugin descriptors.

use std::path::PathBuf;

/// A registered plugin as far as the output tree is concerned.
///
/// The public folder is resolved when the plugin is registered; a plugin
/// without static assets leaves it empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PluginDescriptor {
    /// Plugin name. Its assets are copied to `{output_dir}/{name}/`.
    pub name: String,
    /// Folder of static assets, if the plugin ships any.
    pub public_folder: Option<PathBuf>,
}

impl PluginDescriptor {
    /// Descriptor for a plugin without static assets.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            public_folder: None,
        }
    }

    /// Set the folder of static assets.
    #[must_use]
    pub fn with_public_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.public_folder = Some(folder.into());
        self
    }
}
