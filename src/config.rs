//! Application configuration
//!
//! Built-in defaults, then an optional TOML file, then `YGGDRASIL_*`
//! environment variables. Command-line flags are applied last by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{GEDCOM_BUCKET, MEDIA_BUCKET};

pub const ENV_DATABASE: &str = "YGGDRASIL_DATABASE";
pub const ENV_STORAGE_ROOT: &str = "YGGDRASIL_STORAGE_ROOT";
pub const ENV_PORT: &str = "YGGDRASIL_PORT";
pub const ENV_CORS_ORIGIN: &str = "YGGDRASIL_CORS_ORIGIN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file, or `:memory:`
    pub database_path: String,
    /// Directory holding one subdirectory per blob bucket
    pub storage_root: PathBuf,
    pub media_bucket: String,
    pub gedcom_bucket: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "yggdrasil.db".to_string(),
            storage_root: PathBuf::from("storage"),
            media_bucket: MEDIA_BUCKET.to_string(),
            gedcom_bucket: GEDCOM_BUCKET.to_string(),
            port: 3000,
            cors_origin: None,
        }
    }
}

impl AppConfig {
    /// Defaults, the file at `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database_path = database;
        }
        if let Some(root) = lookup(ENV_STORAGE_ROOT) {
            self.storage_root = PathBuf::from(root);
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PORT.to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(origin) = lookup(ENV_CORS_ORIGIN) {
            let origin = origin.trim();
            self.cors_origin = (!origin.is_empty()).then(|| origin.to_string());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database_path, "yggdrasil.db");
        assert_eq!(config.media_bucket, "media");
        assert_eq!(config.gedcom_bucket, "gedcoms");
        assert_eq!(config.port, 3000);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
database_path = "family.db"
port = 8080
"#,
        )
        .unwrap();
        assert_eq!(config.database_path, "family.db");
        assert_eq!(config.port, 8080);
        assert_eq!(config.media_bucket, "media");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\nstorage_root = \"/srv/blobs\"").unwrap();

        let config = AppConfig::from_file(file.path())
            .unwrap()
            .with_overrides(lookup_from(&[
                (ENV_PORT, "9090"),
                (ENV_CORS_ORIGIN, "http://localhost:5173"),
            ]))
            .unwrap();

        assert_eq!(config.port, 9090);
        assert_eq!(config.storage_root, PathBuf::from("/srv/blobs"));
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:5173"));
    }

    #[test]
    fn test_invalid_port_override() {
        let err = AppConfig::default()
            .with_overrides(lookup_from(&[(ENV_PORT, "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/yggdrasil.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }
}
