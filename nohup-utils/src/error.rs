//! Error types for nohup
//!
//! Provides a unified error type used across the nohup crates.

use std::path::PathBuf;
use std::time::Duration;

/// Main error type for nohup operations
#[derive(Debug, thiserror::Error)]
pub enum NohupError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Protocol Errors ===

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // === Action Errors ===

    #[error("Failed to spawn process: {0}")]
    ProcessSpawn(String),

    #[error("Command timed out after {timeout:?}")]
    CommandTimeout { timeout: Duration },

    #[error("String to replace not found in {path}")]
    ReplaceTargetNotFound { path: PathBuf },

    #[error("Automation error: {0}")]
    Automation(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NohupError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an automation error
    pub fn automation(msg: impl Into<String>) -> Self {
        Self::Automation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using NohupError
pub type Result<T> = std::result::Result<T, NohupError>;
