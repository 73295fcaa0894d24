//! Error types for the typer-deduper
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Row-level typing failures are not errors: they are recorded in the final
//! table's `_airbyte_meta` column and never surface here.

use thiserror::Error;

/// The main error type for the typer-deduper
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Stream Configuration Errors
    // ============================================================================
    #[error("Stream '{stream}' uses append_dedup but declares no primary key")]
    MissingPrimaryKey { stream: String },

    #[error("Stream '{stream}' declares primary key column '{column}' more than once")]
    DuplicatePrimaryKey { stream: String, column: String },

    #[error("Stream '{stream}' references undeclared column '{column}'")]
    UnknownColumn { stream: String, column: String },

    #[error("Invalid schema for stream '{stream}': {message}")]
    InvalidSchema { stream: String, message: String },

    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    // ============================================================================
    // Destination Errors
    // ============================================================================
    #[error("Execution failed: {message} (statement: {statement})")]
    Execution {
        statement: String,
        message: String,
        retryable: bool,
    },

    #[error("Failed to introspect table {table}: {message}")]
    Introspection { table: String, message: String },

    #[error("Failed to swap {staging} into {production}: {message}")]
    Swap {
        staging: String,
        production: String,
        message: String,
    },

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    // ============================================================================
    // Soft Reset Errors
    // ============================================================================
    #[error("Invalid soft reset transition from {from} to {to}")]
    InvalidResetTransition { from: String, to: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("Destination state error: {message}")]
    State { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an execution error
    pub fn execution(
        statement: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Execution {
            statement: statement.into(),
            message: message.into(),
            retryable,
        }
    }

    /// Create an introspection error
    pub fn introspection(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Introspection {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a swap error
    pub fn swap(
        staging: impl Into<String>,
        production: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Swap {
            staging: staging.into(),
            production: production.into(),
            message: message.into(),
        }
    }

    /// Create a destination state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Check if this error is a configuration error (raised before any I/O)
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::MissingPrimaryKey { .. }
                | Error::DuplicatePrimaryKey { .. }
                | Error::UnknownColumn { .. }
                | Error::InvalidSchema { .. }
                | Error::StreamNotFound { .. }
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Execution { retryable, .. } => *retryable,
            Error::DuckDb(e) => is_transient_duckdb_message(&e.to_string()),
            Error::Io(_) => true,
            _ => false,
        }
    }
}

/// Check if a DuckDB error message describes a transient failure
pub(crate) fn is_transient_duckdb_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("conflict") || lower.contains("io error") || lower.contains("could not set lock")
}

/// Result type alias for the typer-deduper
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
