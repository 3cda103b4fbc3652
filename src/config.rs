//! User configuration
//!
//! Read from `<config dir>/nodezator/config.json`; every field is optional
//! in the file and falls back to its default.

use std::fs;
use std::path::{Path, PathBuf};

use glam::IVec2;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::export::ExportOptions;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Extra directories searched for node packs, before the standard ones
    pub node_pack_dirs: Vec<PathBuf>,
    pub palette_size: usize,
    pub duplicate_offset: IVec2,
    /// Default for `ExportOptions::wrap_in_main`
    pub export_wrap_in_main: bool,
    /// Default for `ExportOptions::add_main_guard`
    pub export_add_main_guard: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_pack_dirs: Vec::new(),
            palette_size: constants::palette::DEFAULT_PALETTE_SIZE,
            duplicate_offset: IVec2::from_array(constants::graph::DEFAULT_DUPLICATE_OFFSET),
            export_wrap_in_main: false,
            export_add_main_guard: false,
        }
    }
}

impl AppConfig {
    /// Standard location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(constants::file::CONFIG_DIR_NAME)
                .join(constants::file::CONFIG_FILE_NAME)
        })
    }

    /// Loads the config at the standard location, or defaults when absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config.sanitized())
    }

    /// A palette needs at least one colour
    fn sanitized(mut self) -> Self {
        self.palette_size = self.palette_size.max(1);
        self
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            wrap_in_main: self.export_wrap_in_main,
            add_main_guard: self.export_add_main_guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"palette_size": 0, "export_add_main_guard": true}"#).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.palette_size, 1);
        assert_eq!(config.duplicate_offset, IVec2::new(20, 20));
        assert_eq!(
            config.export_options(),
            ExportOptions {
                wrap_in_main: false,
                add_main_guard: true
            }
        );
    }

    #[test]
    fn test_invalid_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            AppConfig::load_from(&temp.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
