//! Core error types for medminder-core.
//!
//! Very few of these ever reach a human: the reminder paths degrade to
//! console output instead of failing. They exist so the degraded paths can
//! log what went wrong, and so the `config` commands can report it.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from launching reminder processes.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Executable lookup or process spawn failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home or config directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Dose log persistence errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to write the log file
    #[error("Failed to write dose log to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize the log
    #[error("Failed to serialize dose log: {0}")]
    Serialize(#[from] serde_json::Error),

    /// In-memory backend lock was poisoned
    #[error("Dose log backend is unavailable")]
    Unavailable,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
