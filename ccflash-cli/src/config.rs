//! Configuration file support for the ccflash CLI.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (highest first):
//! 1. Command-line arguments
//! 2. Local config file (./ccflash.toml)
//! 3. Global config file (~/.config/ccflash/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                if let Some(global_config) = Self::load_from_file(&global_path) {
                    debug!("Loaded global config from {}", global_path.display());
                    config.merge(global_config);
                }
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("ccflash.toml")) {
            debug!("Loaded local config from ccflash.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Invalid config file {}: {e}", path.display());
                    None
                },
            },
            Err(e) => {
                warn!("Could not read config file {}: {e}", path.display());
                None
            },
        }
    }

    /// Merge another config into this one; set fields win.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
    }

    /// Path of the global config file.
    fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ccflash").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Remember a port in the global config for the next invocation.
    pub fn remember_port(&mut self, port: &str) {
        if self.connection.port.as_deref() == Some(port) {
            return;
        }
        self.connection.port = Some(port.to_string());
        self.save();
    }

    /// Write the global config file. Failures are logged, never fatal.
    fn save(&self) {
        let Some(path) = Self::global_config_path() else {
            return;
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Could not create config directory: {e}");
                return;
            }
        }

        match toml::to_string_pretty(self) {
            Ok(contents) => {
                if let Err(e) = fs::write(&path, contents) {
                    warn!("Could not write config file {}: {e}", path.display());
                } else {
                    debug!("Saved config to {}", path.display());
                }
            },
            Err(e) => warn!("Could not serialize config: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_port() {
        let config = Config::default();
        assert!(config.connection.port.is_none());
    }

    #[test]
    fn test_parse_config_file() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            port = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_empty_config_file_is_valid() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.connection.port.is_none());
    }

    fn config_with_port(port: &str) -> Config {
        Config {
            connection: ConnectionConfig {
                port: Some(port.into()),
            },
        }
    }

    #[test]
    fn test_merge_prefers_set_fields() {
        let mut config = config_with_port("/dev/ttyUSB0");

        config.merge(Config::default());
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));

        config.merge(config_with_port("/dev/ttyACM1"));
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyACM1"));
    }
}
