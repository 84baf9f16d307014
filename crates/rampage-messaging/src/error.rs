//! Error handling for the message bus
//!
//! Handler faults never surface here: a panicking handler is isolated and
//! logged by the bus. These errors cover the bus's own lifecycle:
//! - Use after disposal
//! - Background resources that failed to start (threads, pools, runtimes)
//! - Configuration loading and validation
//!
//! All error types use `thiserror` for ergonomic error handling.

use std::io;
use thiserror::Error;

/// Message bus error type
#[derive(Error, Debug)]
pub enum MessagingError {
    /// The bus was disposed and no longer accepts subscriptions or messages
    #[error("Message bus has been disposed")]
    Disposed,

    /// The worker pool backing a parallel strategy could not be built
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The tokio runtime backing the task or parallel strategy could not be built
    #[error("Failed to build task runtime: {0}")]
    Runtime(#[source] io::Error),

    /// A dedicated worker thread could not be spawned
    #[error("Failed to spawn worker thread '{name}': {source}")]
    WorkerSpawn {
        /// Name of the thread that failed to start.
        name: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to bus configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O error while reading or writing a config file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The config file extension is neither `.json` nor `.toml`
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// Unknown dispatch strategy name
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// A configuration value is invalid
    #[error("Invalid setting '{key}': {reason}")]
    Invalid {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
