//! Error types for the stepper engine
//!
//! Units of work never produce these: their failures are folded into task
//! outcomes. These cover misuse of the API, bad configuration and terminal I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by stepper operations
#[derive(Error, Debug)]
pub enum StepperError {
    /// A phase or task label was empty
    #[error("step {field} must not be empty")]
    EmptyLabel { field: &'static str },

    /// Sort key is NaN or infinite
    #[error("step order must be a finite number, got {0}")]
    InvalidOrder(f64),

    /// Configuration values failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML configuration could not be parsed
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The background refresher thread could not be started
    #[error("failed to spawn refresher thread: {0}")]
    RefresherSpawn(#[source] std::io::Error),

    /// Writing to the terminal failed
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stepper operations
pub type Result<T> = std::result::Result<T, StepperError>;
