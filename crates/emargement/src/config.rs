//! Configuration management for emargement.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::export::ExportFormat;
use crate::roster::{normalize_column_name, RosterField};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "emargement";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "events.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `EMARGEMENT_`, sections separated by `__`)
/// 2. TOML config file at `~/.config/emargement/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Roster import configuration.
    pub import: ImportConfig,
    /// Export configuration.
    pub export: ExportConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/emargement/events.db`
    pub database_path: Option<PathBuf>,
}

/// Roster import configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Extra header aliases, consulted before the built-in table.
    ///
    /// ```toml
    /// [import.aliases]
    /// "matricule" = "id"
    /// "raison sociale" = "company"
    /// ```
    pub aliases: BTreeMap<String, RosterField>,
    /// Shortest header allowed to match an alias that merely contains it.
    pub min_partial_match_len: usize,
}

/// Export-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory export files are written to.
    /// Defaults to the current directory.
    pub directory: Option<PathBuf>,
    /// Format used when none is given on the command line.
    pub default_format: ExportFormat,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            aliases: BTreeMap::new(),
            min_partial_match_len: 3,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `EMARGEMENT_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("EMARGEMENT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.import.min_partial_match_len == 0 {
            return Err(Error::ConfigValidation {
                message: "min_partial_match_len must be greater than 0".to_string(),
            });
        }

        for alias in self.import.aliases.keys() {
            if normalize_column_name(alias).is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("import alias '{alias}' is empty after normalization"),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the export directory, falling back to the current directory.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.storage.database_path.is_none());
        assert!(config.import.aliases.is_empty());
        assert_eq!(config.import.min_partial_match_len, 3);
        assert_eq!(config.export.default_format, ExportFormat::Xlsx);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_partial_len() {
        let mut config = Config::default();
        config.import.min_partial_match_len = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("min_partial_match_len"));
    }

    #[test]
    fn test_validate_blank_alias() {
        let mut config = Config::default();
        config
            .import
            .aliases
            .insert("  !! ".to_string(), RosterField::Id);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("empty after normalization"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("events.db"));
        assert!(path.to_string_lossy().contains("emargement"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.storage.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_export_dir_default() {
        let config = Config::default();
        assert_eq!(config.export_dir(), PathBuf::from("."));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("emargement"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "emargement_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            r#"
[import]
min_partial_match_len = 4

[import.aliases]
"matricule" = "id"
"raison sociale" = "company"

[export]
default_format = "csv"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.import.min_partial_match_len, 4);
        assert_eq!(
            config.import.aliases.get("matricule"),
            Some(&RosterField::Id)
        );
        assert_eq!(
            config.import.aliases.get("raison sociale"),
            Some(&RosterField::Company)
        );
        assert_eq!(config.export.default_format, ExportFormat::Csv);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_import_config_deserialize() {
        let json = r#"{"aliases": {"badge": "id"}}"#;
        let import: ImportConfig = serde_json::from_str(json).unwrap();
        assert_eq!(import.aliases.get("badge"), Some(&RosterField::Id));
        assert_eq!(import.min_partial_match_len, 3);
    }

    #[test]
    fn test_import_config_rejects_unknown_field() {
        let json = r#"{"aliases": {"badge": "shoe_size"}}"#;
        let result: std::result::Result<ImportConfig, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }
}
