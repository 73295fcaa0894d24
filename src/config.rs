//! Runtime configuration
//!
//! The typer-deduper is configured with a small YAML file:
//!
//! ```yaml
//! destination:
//!   type: duckdb
//!   path: ./warehouse.duckdb
//! raw_namespace: airbyte_internal
//! default_namespace: main
//! max_concurrency: 4
//! retry:
//!   max_retries: 3
//!   backoff: exponential
//! log_level: INFO
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::destination::RetryPolicy;
use crate::dialect::SqlDialect;
use crate::engine::TyperDeduperOptions;
use crate::error::{Error, Result};
use crate::naming::IdentifierResolver;
use crate::types::{BackoffType, LogLevel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete typer-deduper configuration loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TyperDeduperConfig {
    /// Where final and raw tables live
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Namespace holding raw tables and destination state
    #[serde(default = "default_raw_namespace")]
    pub raw_namespace: String,

    /// Namespace for streams that declare none
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Streams prepared or typed at once
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,

    /// Concurrent database connections
    #[serde(default = "default_concurrency")]
    pub max_connections: usize,

    /// Retry of transient execution failures
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for TyperDeduperConfig {
    fn default() -> Self {
        Self {
            destination: DestinationConfig::default(),
            raw_namespace: default_raw_namespace(),
            default_namespace: default_namespace(),
            max_concurrency: default_concurrency(),
            max_connections: default_concurrency(),
            retry: RetryConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

fn default_raw_namespace() -> String {
    "airbyte_internal".to_string()
}

fn default_namespace() -> String {
    "main".to_string()
}

fn default_concurrency() -> usize {
    4
}

impl TyperDeduperConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::invalid_value("max_concurrency", "must be at least 1"));
        }
        if self.max_connections == 0 {
            return Err(Error::invalid_value("max_connections", "must be at least 1"));
        }
        if self.raw_namespace.trim().is_empty() {
            return Err(Error::invalid_value("raw_namespace", "must not be empty"));
        }
        if self.default_namespace.trim().is_empty() {
            return Err(Error::invalid_value("default_namespace", "must not be empty"));
        }
        if self.retry.initial_ms > self.retry.max_ms {
            return Err(Error::invalid_value(
                "retry.initial_ms",
                format!(
                    "{} exceeds retry.max_ms ({})",
                    self.retry.initial_ms, self.retry.max_ms
                ),
            ));
        }
        Ok(())
    }

    /// Retry policy for the destination driver
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            backoff_type: self.retry.backoff,
            initial_backoff: Duration::from_millis(self.retry.initial_ms),
            max_backoff: Duration::from_millis(self.retry.max_ms),
        }
    }

    /// Engine options
    pub fn engine_options(&self) -> TyperDeduperOptions {
        TyperDeduperOptions::new().with_max_concurrency(self.max_concurrency)
    }

    /// Identifier resolver for a dialect
    pub fn resolver(&self, dialect: &dyn SqlDialect) -> IdentifierResolver {
        IdentifierResolver::new(
            dialect.naming(),
            self.raw_namespace.clone(),
            self.default_namespace.clone(),
        )
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Supported destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationType {
    #[default]
    Duckdb,
}

/// Destination connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(rename = "type", default)]
    pub destination_type: DestinationType,

    /// Database file; in-memory when absent
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// Retry
// ============================================================================

/// Retry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    10_000
}

// ============================================================================
// Loading
// ============================================================================

/// Load and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<TyperDeduperConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        }
    })?;
    load_config_from_str(&content)
}

/// Load and validate a configuration from a YAML string
pub fn load_config_from_str(content: &str) -> Result<TyperDeduperConfig> {
    let config: TyperDeduperConfig = if content.trim().is_empty() {
        TyperDeduperConfig::default()
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse config: {e}")))?
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, TyperDeduperConfig::default());
        assert_eq!(config.raw_namespace, "airbyte_internal");
        assert_eq!(config.default_namespace, "main");
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.destination.path, None);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
destination:
  type: duckdb
  path: /tmp/warehouse.duckdb
raw_namespace: raw
default_namespace: analytics
max_concurrency: 2
max_connections: 8
retry:
  max_retries: 5
  backoff: linear
  initial_ms: 50
  max_ms: 500
log_level: DEBUG
"#;
        let config = load_config_from_str(yaml).unwrap();
        assert_eq!(config.destination.destination_type, DestinationType::Duckdb);
        assert_eq!(config.destination.path.as_deref(), Some("/tmp/warehouse.duckdb"));
        assert_eq!(config.raw_namespace, "raw");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.log_level, LogLevel::Debug);

        let retry = config.retry_policy();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.backoff_type, BackoffType::Linear);
        assert_eq!(retry.initial_backoff, Duration::from_millis(50));
        assert_eq!(retry.max_backoff, Duration::from_millis(500));

        assert_eq!(config.engine_options().max_concurrency, 2);
    }

    #[test]
    fn test_validation() {
        let err = load_config_from_str("max_concurrency: 0").unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));

        let err = load_config_from_str("raw_namespace: ' '").unwrap_err();
        assert!(err.to_string().contains("raw_namespace"));

        let err = load_config_from_str("retry:\n  initial_ms: 20000").unwrap_err();
        assert!(err.to_string().contains("retry.initial_ms"));
    }

    #[test]
    fn test_unknown_destination_rejected() {
        let err = load_config_from_str("destination:\n  type: snowflake").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_namespace: public").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.default_namespace, "public");

        let err = load_config("/nonexistent/config.yaml").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}
