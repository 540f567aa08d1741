//! Session configuration
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! ```toml
//! [log]
//! filter = "info"
//!
//! [plugins]
//! directories = ["target/debug"]
//! load = ["target/debug/libmaterial_visualize_normal"]
//!
//! [render]
//! threads = 4
//! ```
//!
//! Environment overrides:
//! - `LUMINA_LOG` replaces `log.filter`
//! - `LUMINA_PLUGIN_PATH` (platform path list) adds plugin directories
//! - `LUMINA_RENDER_THREADS` replaces `render.threads`

use std::path::{Path, PathBuf};

use lumina_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration of a [`crate::Session`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub log: LogConfig,
    pub plugins: PluginConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `env_logger` filter directive
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directories scanned for plugin libraries at startup
    pub directories: Vec<PathBuf>,
    /// Individual plugin libraries, without the platform extension
    pub load: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Worker threads handed to renderers that do not set their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl SessionConfig {
    /// Load `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::load_from_file(path.as_ref())?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load a TOML file without looking at the environment
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded session config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(filter) = lookup("LUMINA_LOG").filter(|f| !f.is_empty()) {
            self.log.filter = filter;
        }

        if let Some(paths) = lookup("LUMINA_PLUGIN_PATH") {
            for dir in std::env::split_paths(&paths) {
                if !dir.as_os_str().is_empty() && !self.plugins.directories.contains(&dir) {
                    log::info!("Plugin directory from env: {}", dir.display());
                    self.plugins.directories.push(dir);
                }
            }
        }

        if let Some(threads) = lookup("LUMINA_RENDER_THREADS") {
            match threads.trim().parse::<usize>() {
                Ok(n) => self.render.threads = Some(n),
                Err(_) => log::warn!("Ignoring LUMINA_RENDER_THREADS={:?}", threads),
            }
        }
    }
}
