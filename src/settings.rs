//! Configuration loading and plugin resolution.
//!
//! [`Settings::load`] reads a JSON file and extracts its `basejump` section:
//!
//! ```json
//! {
//!   "basejump": {
//!     "settings": { "static": { "path": "public" } },
//!     "server": { "port": 3000 },
//!     "plugins": ["metrics", "auth"],
//!     "environment": "env.json"
//!   }
//! }
//! ```
//!
//! Plugin names resolve against a [`PluginRegistry`] built once at startup
//! from an explicit, prioritized list of search roots — the first root
//! containing an entry with the plugin's name wins. The roots are passed in
//! by the caller, never derived from process state, and the filesystem is
//! probed only at registry construction, never per lookup.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;

#[derive(Deserialize)]
struct ConfigFile {
    basejump: Option<Config>,
}

#[derive(Debug, Default, Deserialize)]
struct Config {
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    server: Map<String, Value>,
    #[serde(default)]
    plugins: Vec<String>,
    #[serde(default)]
    environment: Option<String>,
}

/// A loaded configuration: the `basejump` section of one JSON file.
pub struct Settings {
    path: PathBuf,
    config: Config,
}

impl Settings {
    /// Reads and validates a configuration file.
    ///
    /// Fails if the file does not have a `.json` extension, cannot be read,
    /// is not valid JSON, or lacks the top-level `basejump` key. All
    /// failures are fatal; nothing is recovered internally.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            return Err(ConfigError::NotJson(path));
        }

        let data = tokio::fs::read_to_string(&path).await?;
        let file: ConfigFile = serde_json::from_str(&data)?;
        match file.basejump {
            Some(config) => Ok(Self { path, config }),
            None => Err(ConfigError::Invalid(path)),
        }
    }

    /// The file this configuration was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The application settings map, passed through as-is.
    pub fn settings(&self) -> &Map<String, Value> {
        &self.config.settings
    }

    /// The server settings map, passed through as-is.
    pub fn server(&self) -> &Map<String, Value> {
        &self.config.server
    }

    /// The configured plugin names, in order.
    pub fn plugin_names(&self) -> &[String] {
        &self.config.plugins
    }

    /// Resolves one plugin name against the registry.
    pub fn plugin<'a>(
        &self,
        registry: &'a PluginRegistry,
        name: &str,
    ) -> Result<&'a ResolvedPlugin, ConfigError> {
        registry
            .get(name)
            .ok_or_else(|| ConfigError::PluginNotFound(name.to_owned()))
    }

    /// Resolves every configured plugin, in order. The first unresolvable
    /// name fails the whole call.
    pub fn plugins<'a>(
        &self,
        registry: &'a PluginRegistry,
    ) -> Result<Vec<&'a ResolvedPlugin>, ConfigError> {
        self.config
            .plugins
            .iter()
            .map(|name| self.plugin(registry, name))
            .collect()
    }

    /// Resolves the configured environment file against `cwd`. `None` when
    /// no environment is configured or the file does not exist.
    pub async fn environment(&self, cwd: &Path) -> Option<PathBuf> {
        let relative = self.config.environment.as_ref()?;
        let file = cwd.join(relative);
        match tokio::fs::try_exists(&file).await {
            Ok(true) => Some(file),
            _ => None,
        }
    }
}

/// A plugin name resolved to its location in a search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlugin {
    pub name: String,
    pub path: PathBuf,
}

/// The plugin name → location mapping.
///
/// Built once at startup by [`discover`](PluginRegistry::discover); lookups
/// never touch the filesystem.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, ResolvedPlugin>,
}

impl PluginRegistry {
    /// Scans the search roots in priority order. Each directory entry
    /// registers a plugin under its file name; the first root containing a
    /// name wins. Missing roots are skipped; any other I/O failure aborts
    /// discovery.
    pub async fn discover(search_roots: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut plugins = HashMap::new();
        for root in search_roots {
            let mut entries = match tokio::fs::read_dir(root).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ConfigError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                plugins
                    .entry(name.clone())
                    .or_insert_with(|| ResolvedPlugin { name, path: entry.path() });
            }
        }
        Ok(Self { plugins })
    }

    /// Registers a plugin explicitly, overriding any discovered entry with
    /// the same name.
    pub fn register(&mut self, plugin: ResolvedPlugin) {
        self.plugins.insert(plugin.name.clone(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedPlugin> {
        self.plugins.get(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
