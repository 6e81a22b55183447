//! # Error Types
//!
//! Errors that cross crate boundaries through the port traits.

use thiserror::Error;

/// Failures raised while executing a command against a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// No provider is registered under this module name.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The module does not implement this command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Arguments were rejected by the module.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Module-defined failure with its own error code.
    #[error("{code}: {message}")]
    Failed { code: String, message: String },
}

impl CommandError {
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code surfaced to callers.
    pub fn error_code(&self) -> &str {
        match self {
            Self::ModuleNotFound(_) => "module_not_found",
            Self::UnknownCommand(_) => "unknown_command",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Failed { code, .. } => code,
        }
    }
}

/// Transport lifecycle failures.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport {0} already started")]
    AlreadyStarted(String),

    #[error("transport {name} i/o failure: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport {0} did not shut down in time")]
    ShutdownTimeout(String),

    #[error("transport {name}: {message}")]
    Other { name: String, message: String },
}

/// Failures of the metric/audit store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store is closed")]
    Closed,
}
