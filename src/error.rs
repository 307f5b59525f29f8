//! Error types and result handling for cdc-launcher.
//!
//! This module defines the main error type [`Error`] and a convenience
//! [`Result`] type alias used throughout the crate.
//!
//! # Example
//!
//! ```rust
//! use cdc_launcher::{Error, Result};
//!
//! fn check_docker() -> Result<()> {
//!     Err(Error::MissingTool { tool: "docker".to_string() })
//! }
//!
//! match check_docker() {
//!     Ok(()) => println!("docker available"),
//!     Err(Error::MissingTool { tool }) => eprintln!("install {} first", tool),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for cdc-launcher operations.
///
/// Each variant maps to one failure class of the setup sequence, from
/// missing tooling on the host to a rejected connector definition.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, from the config file, environment or flags.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error, typically from directory creation or process spawning.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure talking to Kafka Connect.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error for connector definitions and responses.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error when rendering or reading the compose file.
    #[error("Compose file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// PostgreSQL client error during replication verification.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Kafka client error while reading broker metadata.
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    /// A blocking client call running off the async runtime panicked or
    /// was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A required command-line tool is not installed or not on `PATH`.
    #[error("Required tool not found: {tool}")]
    MissingTool {
        /// Name of the missing executable
        tool: String,
    },

    /// An external command ran but exited unsuccessfully.
    #[error("Command `{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Exit code, `None` when the process was killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// A bounded wait ran out of attempts or time.
    #[error("Timeout error: {message}")]
    Timeout {
        /// Description of what timed out
        message: String,
    },

    /// Kafka Connect rejected the connector configuration.
    #[error("Connector validation failed ({status}): {message}")]
    Validation {
        /// HTTP status returned by the API
        status: u16,
        /// Error message returned by the API
        message: String,
    },

    /// Kafka Connect returned an unexpected error status.
    #[error("Kafka Connect API error ({status}): {message}")]
    Api {
        /// HTTP status returned by the API
        status: u16,
        /// Error message returned by the API
        message: String,
    },

    /// Logical replication is not set up the way the connector needs it.
    #[error("Replication error: {message}")]
    Replication {
        /// Description of the replication problem
        message: String,
    },

    /// The connector definition failed local checks before submission.
    #[error("Invalid connector definition: {message}")]
    InvalidDefinition {
        /// Description of what was invalid
        message: String,
    },
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

/// A convenient Result type alias for cdc-launcher operations.
///
/// This is equivalent to `std::result::Result<T, cdc_launcher::Error>`.
pub type Result<T> = std::result::Result<T, Error>;
