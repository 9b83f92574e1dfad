//! Engine configuration, loaded from TOML.
//!
//! # Example
//!
//! ```toml
//! [allocator]
//! prefix = "UA"
//! server_id = "srv1"
//! retry_delay_ms = 1000
//! max_store_errors = 30
//!
//! [store]
//! path = "/var/lib/lotreg"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::allocator::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {origin}: {message}")]
    Parse { origin: String, message: String },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub allocator: AllocatorConfig,
    pub store: StoreConfig,
}

/// `[allocator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Identifier prefix.
    pub prefix: String,
    /// Namespace appended to identifiers and to the counter document id.
    pub server_id: String,
    /// Pause after a non-conflict store error.
    pub retry_delay_ms: u64,
    /// Give up after this many store errors in one allocation. Unbounded when
    /// absent.
    pub max_store_errors: Option<u32>,
    /// Give up after this many write conflicts in one allocation. Unbounded
    /// when absent.
    pub max_conflicts: Option<u32>,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            prefix: lotreg_core::DEFAULT_PREFIX.to_string(),
            server_id: String::new(),
            retry_delay_ms: 1000,
            max_store_errors: None,
            max_conflicts: None,
        }
    }
}

impl AllocatorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.retry_delay_ms),
            max_store_errors: self.max_store_errors,
            max_conflicts: self.max_conflicts,
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of the file-backed document store.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./lotreg-data"),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            origin: "configuration".to_string(),
            message: e.to_string(),
        })
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            origin: format!("'{}'", path.display()),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.allocator.prefix, "UA");
        assert_eq!(config.allocator.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [allocator]
            server_id = "srv1"
            max_store_errors = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.allocator.prefix, "UA");
        assert_eq!(config.allocator.server_id, "srv1");
        let policy = config.allocator.retry_policy();
        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.max_store_errors, Some(3));
        assert_eq!(policy.max_conflicts, None);
        assert_eq!(config.store.path, PathBuf::from("./lotreg-data"));
    }

    #[test]
    fn type_errors_are_reported() {
        let err = EngineConfig::from_toml_str("[allocator]\nretry_delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/lotreg.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }), "{err}");
    }
}
