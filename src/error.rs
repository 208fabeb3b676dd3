//! Error types for the simulator

use thiserror::Error;

/// Result type for simulator operations
pub type SimResult<T> = Result<T, SimError>;

/// Error taxonomy for model loading, configuration and engine control
#[derive(Error, Debug)]
pub enum SimError {
    /// Semantic model validation failure, with the offending path
    #[error("validation error at {path}: {message}")]
    Validation { path: String, message: String },

    /// Configuration-policy failure (unknown enum value, bad parameter shape)
    #[error("configuration error at {path}: {message}")]
    Config { path: String, message: String },

    /// Plugin registry lookup failure
    #[error("unknown {kind} '{name}'")]
    UnknownPlugin { kind: &'static str, name: String },

    /// Engine lifecycle guard violation
    #[error("engine state error: {0}")]
    EngineState(String),

    /// Runtime failure raised by a plugin
    #[error("plugin '{plugin}' failed: {message}")]
    Plugin { plugin: String, message: String },

    /// Configuration file I/O failure
    #[error("config file error: {0}")]
    Io(String),

    /// Configuration syntax failure (YAML/JSON)
    #[error("invalid config syntax: {0}")]
    Format(String),
}

impl SimError {
    /// Validation error with path context
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Configuration error with path context
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Plugin runtime error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Io(err.to_string())
    }
}
