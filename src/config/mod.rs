//! Host configuration
//!
//! A [`HostConfig`] controls the script engine limits and logging of every
//! component created through a [`crate::Host`]. It is stored as TOML.
//!
//! # Location
//!
//! [`HostConfig::load_or_default`] looks in order at:
//! - the file named by the `CPY_CONFIG` environment variable
//! - `host.toml` in the platform config directory under `portbridge/`
//!   (`~/.config/portbridge/host.toml` on Linux)
//!
//! and falls back to defaults when neither yields a usable file.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! max_operations = 50000
//! allow_imports = false
//!
//! [logging]
//! filter = "portbridge=debug"
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{ComponentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for the config directory
pub const APP_ID: &str = "portbridge";

/// Config filename
pub const CONFIG_FILE: &str = "host.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "CPY_CONFIG";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete host configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl HostConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ComponentError::Config(format!("Failed to parse host config: {}", e)))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComponentError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Save the config as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ComponentError::Config(format!(
                        "Failed to create {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ComponentError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            ComponentError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// The config file that [`HostConfig::load_or_default`] would read
    pub fn locate() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        default_config_path().filter(|p| p.exists())
    }

    /// Load the config from its usual location, returning defaults on any error
    pub fn load_or_default() -> Self {
        match Self::locate() {
            Some(path) => Self::load(&path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load host config, using defaults: {}", e);
                Self::default()
            }),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_defaults() {
        let config = HostConfig::default();
        assert_eq!(config.engine.max_operations, DEFAULT_MAX_OPERATIONS);
        assert!(config.engine.allow_imports);
        assert_eq!(config.logging.filter, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HostConfig::from_toml_str(
            r#"
[engine]
max_operations = 500
"#,
        )
        .unwrap();
        assert_eq!(config.engine.max_operations, 500);
        assert_eq!(config.engine.max_call_levels, 64);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = HostConfig::from_toml_str("[engine\nmax_operations = ").unwrap_err();
        assert!(matches!(err, ComponentError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = HostConfig::default();
        config.engine.allow_imports = false;
        config.logging.filter = "debug".to_string();
        config.save(&path).unwrap();

        assert_eq!(HostConfig::load(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_load_or_default_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[engine]\nmax_operations = 42\n").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        let config = HostConfig::load_or_default();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config.engine.max_operations, 42);
    }

    #[test]
    #[serial]
    fn test_load_or_default_with_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "not = [valid").unwrap();

        std::env::set_var(CONFIG_ENV, &path);
        let config = HostConfig::load_or_default();
        std::env::remove_var(CONFIG_ENV);

        assert_eq!(config, HostConfig::default());
    }
}
