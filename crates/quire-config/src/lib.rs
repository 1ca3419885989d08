//! Configuration management for Quire.
//!
//! Parses `quire.toml` with serde and finds it in the current directory or
//! its parents. Relative paths resolve against the directory holding the
//! file. CLI settings are applied after resolution via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `server.host` supports `${VAR}` (error if unset) and `${VAR:-default}`.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "${QUIRE_HOST:-127.0.0.1}"
//! port = 7979
//!
//! [docs]
//! source_dir = "docs"
//! output_dir = ".quire/site"
//! page_patterns = ["**/*.md"]
//!
//! [watch]
//! ignore = ["docs/drafts"]
//! debounce_ms = 50
//!
//! [render]
//! workers = 4
//!
//! [[plugins]]
//! name = "theme"
//! public_folder = "theme/public"
//! ```

mod expand;

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "quire.toml";

/// Project data directory, relative to the config directory.
const PROJECT_DIR: &str = ".quire";

/// Longest allowed debounce window in milliseconds.
pub const MAX_DEBOUNCE_MS: u64 = 100;

/// CLI settings that override configuration file values.
///
/// Only `Some` values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override docs source directory.
    pub source_dir: Option<PathBuf>,
    /// Override output directory.
    pub output_dir: Option<PathBuf>,
    /// Override live reload enabled flag.
    pub live_reload_enabled: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Docs paths as written in TOML.
    docs: DocsConfigRaw,
    /// Watch settings as written in TOML.
    watch: WatchConfigRaw,
    /// Render pool configuration.
    pub render: RenderConfig,
    /// Live reload configuration.
    pub live_reload: LiveReloadConfig,
    /// Plugins as written in TOML.
    plugins: Vec<PluginConfigRaw>,

    /// Resolved docs configuration (set after loading).
    #[serde(skip)]
    pub docs_resolved: DocsConfig,
    /// Resolved watch configuration (set after loading).
    #[serde(skip)]
    pub watch_resolved: WatchConfig,
    /// Resolved plugins (set after loading).
    #[serde(skip)]
    pub plugins_resolved: Vec<PluginConfig>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 7979,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct DocsConfigRaw {
    source_dir: Option<String>,
    output_dir: Option<String>,
    page_patterns: Option<Vec<String>>,
}

/// Resolved documentation paths.
#[derive(Debug, Default)]
pub struct DocsConfig {
    /// Source directory for pages.
    pub source_dir: PathBuf,
    /// Output directory for rendered pages.
    pub output_dir: PathBuf,
    /// Project data directory (`.quire/`).
    pub project_dir: PathBuf,
    /// Glob patterns, relative to `source_dir`, that select pages.
    pub page_patterns: Vec<String>,
}

impl DocsConfig {
    /// Persisted page tree (`.quire/page-tree.json`).
    #[must_use]
    pub fn tree_file(&self) -> PathBuf {
        self.project_dir.join("page-tree.json")
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct WatchConfigRaw {
    root: Option<String>,
    ignore: Vec<String>,
    debounce_ms: Option<u64>,
}

/// Resolved filesystem watch configuration.
#[derive(Debug, Default)]
pub struct WatchConfig {
    /// Watched directory.
    pub root: PathBuf,
    /// Ignored subtrees.
    pub ignore: Vec<PathBuf>,
    /// Debounce window in milliseconds.
    pub debounce_ms: u64,
}

/// Render pool configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Worker threads. Defaults to the available parallelism.
    pub workers: Option<usize>,
}

impl RenderConfig {
    /// Configured worker count, or the available parallelism.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZero::get)
        })
    }
}

/// Live reload configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    /// Whether live reload is enabled.
    pub enabled: bool,
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
struct PluginConfigRaw {
    name: String,
    public_folder: Option<String>,
}

/// A registered plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Plugin name.
    pub name: String,
    /// Folder of static assets, resolved against the config directory.
    pub public_folder: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`server.host`").
        field: String,
        /// Error message (e.g., "${`QUIRE_HOST`} not set").
        message: String,
    },
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// for `quire.toml` in the current directory and its parents, falling
    /// back to defaults relative to the current directory.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit `config_path` doesn't exist, parsing
    /// fails, or the result is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(source_dir) = &settings.source_dir {
            self.docs_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(output_dir) = &settings.output_dir {
            self.docs_resolved.output_dir.clone_from(output_dir);
        }
        if let Some(enabled) = settings.live_reload_enabled {
            self.live_reload.enabled = enabled;
        }
    }

    /// Search for the config file in the current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    fn default_with_base(base: &Path) -> Self {
        let mut config = Self {
            server: ServerConfig::default(),
            docs: DocsConfigRaw::default(),
            watch: WatchConfigRaw::default(),
            render: RenderConfig::default(),
            live_reload: LiveReloadConfig::default(),
            plugins: Vec::new(),
            docs_resolved: DocsConfig::default(),
            watch_resolved: WatchConfig::default(),
            plugins_resolved: Vec::new(),
            config_path: None,
        };
        config.resolve_paths(base);
        config
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port cannot be 0".to_owned()));
        }

        let debounce = self.watch_resolved.debounce_ms;
        if debounce == 0 || debounce > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Validation(format!(
                "watch.debounce_ms must be between 1 and {MAX_DEBOUNCE_MS}"
            )));
        }

        if self.render.workers == Some(0) {
            return Err(ConfigError::Validation(
                "render.workers must be greater than 0".to_owned(),
            ));
        }

        if self.docs_resolved.page_patterns.iter().any(String::is_empty) {
            return Err(ConfigError::Validation(
                "docs.page_patterns cannot contain empty patterns".to_owned(),
            ));
        }

        let mut names = std::collections::BTreeSet::new();
        for plugin in &self.plugins_resolved {
            require_non_empty(&plugin.name, "plugins.name")?;
            if !names.insert(plugin.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate plugin name: {}",
                    plugin.name
                )));
            }
        }
        Ok(())
    }

    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.server.host = expand::expand_env(&self.server.host, "server.host")?;
        Ok(())
    }

    /// Resolve relative paths against the config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.docs_resolved = DocsConfig {
            source_dir: resolve(self.docs.source_dir.as_deref(), "docs"),
            output_dir: resolve(self.docs.output_dir.as_deref(), ".quire/site"),
            project_dir: config_dir.join(PROJECT_DIR),
            page_patterns: self
                .docs
                .page_patterns
                .clone()
                .unwrap_or_else(|| vec!["**/*.md".to_owned()]),
        };
        self.watch_resolved = WatchConfig {
            root: self
                .watch
                .root
                .as_deref()
                .map_or_else(|| config_dir.to_path_buf(), |root| config_dir.join(root)),
            ignore: self.watch.ignore.iter().map(|p| config_dir.join(p)).collect(),
            debounce_ms: self.watch.debounce_ms.unwrap_or(50),
        };
        self.plugins_resolved = self
            .plugins
            .iter()
            .map(|plugin| PluginConfig {
                name: plugin.name.clone(),
                public_folder: plugin.public_folder.as_deref().map(|p| config_dir.join(p)),
            })
            .collect();
    }
}
