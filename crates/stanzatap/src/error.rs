//! Error types for stanzatap.
//!
//! This module defines all error types used throughout the stanzatap crate.
//! Most pipeline failures are contained and reported through `tracing`; these
//! errors surface only where a caller can act on them (configuration loading,
//! filter persistence, discovery and the underlying transport).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for stanzatap operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the settings database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Pipeline Errors ===
    /// A textual filter or rule pattern failed to compile.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern text as supplied.
        pattern: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// A persisted filter value could not be read back.
    #[error("malformed persisted filter: {value:?}")]
    MalformedFilter {
        /// The stored value.
        value: String,
    },

    /// A line of a capture file has no direction marker.
    #[error("malformed capture line {line}: {content:?}")]
    MalformedCapture {
        /// 1-based line number.
        line: usize,
        /// The offending line.
        content: String,
    },

    /// Discovery gave up after exhausting its retry budget.
    #[error("failed to locate protocol instance after {attempts} attempts")]
    DiscoveryFailed {
        /// Number of polls performed before giving up.
        attempts: u32,
    },

    /// The underlying transport rejected a stanza.
    #[error("transport error: {0}")]
    Transport(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for stanzatap operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid pattern error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, source: regex::Error) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            source,
        }
    }

    /// Check if this error means discovery has permanently failed.
    #[must_use]
    pub fn is_discovery_failed(&self) -> bool {
        matches!(self, Self::DiscoveryFailed { .. })
    }

    /// Check if this error came from a bad pattern.
    #[must_use]
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. })
    }
}
