//! # Authorization (HG-02)
//!
//! Deny-by-default access control keyed by exact `(source, subject id)`
//! membership.
//!
//! The allowlist model deliberately ignores the `Action`. Finer per-action
//! policy is added by composing another [`Authorizer`] into an
//! [`AuthorizerChain`], never by changing [`AllowlistAuthorizer`].

pub mod allowlist;
pub mod chain;

pub use allowlist::AllowlistAuthorizer;
pub use chain::AuthorizerChain;

use shared_types::{Action, Subject};
use thiserror::Error;

/// Authorization denial reasons.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("empty subject")]
    MalformedSubject,

    #[error("source {0} is not allowed")]
    UnknownSource(String),

    #[error("subject {source_name}/{id} is not allowed")]
    SubjectNotAllowed { source_name: String, id: String },

    /// Rejection raised by a composed per-action policy.
    #[error("action {action} denied for {subject}")]
    ActionDenied { subject: String, action: String },
}

impl AuthzError {
    /// Every denial surfaces to callers as `access_denied`.
    pub fn error_code(&self) -> &'static str {
        "access_denied"
    }
}

/// Access decision for a subject requesting an action.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, subject: &Subject, action: &Action) -> Result<(), AuthzError>;
}
