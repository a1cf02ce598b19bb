//! Configuration loading and types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use assetlens_core::InventoryConfig;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "ASSETLENS_CONFIG";

/// Top-level configuration for the assetlens processor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Inventory service and cache settings
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// First existing config file among the default locations
    pub fn find_path() -> Option<PathBuf> {
        // Check environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }

        // Try common paths
        let mut paths = vec![
            PathBuf::from("assetlens.toml"),
            PathBuf::from("/etc/assetlens/assetlens.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("assetlens/assetlens.toml"));
        }

        paths.into_iter().find(|path| path.exists())
    }
}
