//! Configuration Loading for NovaDE Core.
//!
//! [`ConfigLoader`] locates, parses, and validates TOML configuration
//! documents. A missing file is not an error: the document's `Default` is used
//! instead, so a compositor can start without any configuration present.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::config::{CoreConfig, LoggingConfig};
use crate::error::{ConfigError, CoreError};
use crate::utils::fs as nova_fs;

/// Namespace for configuration loading logic.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads and validates a [`CoreConfig`] from `path`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ReadError`] if the file exists but cannot be read.
    /// - [`ConfigError::ParseError`] if the TOML is malformed or does not match the schema.
    /// - [`ConfigError::ValidationError`] if a value is out of range.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<CoreConfig, CoreError> {
        let path = path.as_ref();
        let mut config: CoreConfig = Self::load_document(path)?;
        Self::validate_logging(&mut config.logging, path.parent())?;
        Ok(config)
    }

    /// Parses and validates a [`CoreConfig`] from an in-memory TOML string.
    ///
    /// Relative log file paths are left untouched since there is no file to
    /// resolve them against.
    pub fn from_toml_str(content: &str) -> Result<CoreConfig, CoreError> {
        let mut config: CoreConfig = Self::parse_document(content)?;
        Self::validate_logging(&mut config.logging, None)?;
        Ok(config)
    }

    /// Reads and deserializes an arbitrary configuration document.
    ///
    /// Returns `T::default()` when the file does not exist or only contains
    /// whitespace.
    pub fn load_document<T>(path: &Path) -> Result<T, CoreError>
    where
        T: DeserializeOwned + Default,
    {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse_document(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Configuration file not found, using defaults");
                Ok(T::default())
            }
            Err(e) => Err(CoreError::Config(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })),
        }
    }

    /// Deserializes an arbitrary configuration document from a TOML string.
    pub fn parse_document<T>(content: &str) -> Result<T, CoreError>
    where
        T: DeserializeOwned + Default,
    {
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        toml::from_str(content).map_err(|e| CoreError::Config(ConfigError::ParseError(e)))
    }

    /// Validates and normalizes a [`LoggingConfig`].
    ///
    /// - The level must be one of "trace", "debug", "info", "warn", "error" and
    ///   is lower-cased.
    /// - The format must be "text" or "json" and is lower-cased.
    /// - A relative `file_path` is resolved against `base_dir` (when given) and
    ///   the parent directory of the log file is created.
    ///
    /// # Arguments
    ///
    /// * `config`: The logging section to validate in place.
    /// * `base_dir`: Directory relative log paths are resolved against.
    pub fn validate_logging(config: &mut LoggingConfig, base_dir: Option<&Path>) -> Result<(), CoreError> {
        let level_lower = config.level.to_lowercase();
        match level_lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => config.level = level_lower,
            _ => {
                return Err(CoreError::Config(ConfigError::ValidationError(format!(
                    "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error.",
                    config.level
                ))));
            }
        }

        let format_lower = config.format.to_lowercase();
        match format_lower.as_str() {
            "text" | "json" => config.format = format_lower,
            _ => {
                return Err(CoreError::Config(ConfigError::ValidationError(format!(
                    "Invalid log format: '{}'. Must be one of text, json.",
                    config.format
                ))));
            }
        }

        if let Some(file_path) = &config.file_path {
            let resolved = match base_dir {
                Some(base) if file_path.is_relative() => base.join(file_path),
                _ => file_path.clone(),
            };
            if let Some(parent_dir) = resolved.parent() {
                if !parent_dir.as_os_str().is_empty() {
                    nova_fs::ensure_dir_exists(parent_dir)?;
                }
            }
            config.file_path = Some(resolved);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from_path(temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.toml");
        fs::write(&path, "   \n").unwrap();
        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn level_and_format_are_normalized() {
        let config = ConfigLoader::from_toml_str("[logging]\nlevel = \"DEBUG\"\nformat = \"Json\"\n").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn invalid_level_is_rejected() {
        let err = ConfigLoader::from_toml_str("[logging]\nlevel = \"supertrace\"\n").unwrap_err();
        match err {
            CoreError::Config(ConfigError::ValidationError(msg)) => assert!(msg.contains("supertrace")),
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = ConfigLoader::from_toml_str("[logging\nlevel = ").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::ParseError(_))));
    }

    #[test]
    fn relative_log_path_is_resolved_against_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("render.toml");
        fs::write(&path, "[logging]\nfile_path = \"logs/render.log\"\n").unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        let expected = temp_dir.path().join("logs/render.log");
        assert_eq!(config.logging.file_path, Some(expected));
        assert!(temp_dir.path().join("logs").is_dir());
    }
}
