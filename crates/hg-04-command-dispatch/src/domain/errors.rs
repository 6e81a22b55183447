use hg_02_authorization::AuthzError;
use shared_types::CommandError;
use std::time::Duration;
use thiserror::Error;

/// Chat text that does not form a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,

    #[error("invalid command format: {0:?}")]
    MissingCommand(String),
}

/// Terminal outcome of a dispatch attempt that did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("bad command: {0}")]
    BadCommand(#[from] ParseError),

    #[error("access denied: {0}")]
    AccessDenied(#[from] AuthzError),

    #[error("rate limit exceeded for {key}")]
    RateLimited { key: String },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    /// Stable machine-readable code surfaced to the caller.
    pub fn error_code(&self) -> &str {
        match self {
            Self::BadCommand(_) => "bad_command",
            Self::AccessDenied(_) => "access_denied",
            Self::RateLimited { .. } => "rate_limited",
            Self::Command(err) => err.error_code(),
            Self::Timeout(_) => "request_timeout",
        }
    }
}
