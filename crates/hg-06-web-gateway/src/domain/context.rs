//! Request-scoped values threaded through the middleware stages.
//!
//! The request-id stage inserts a [`RequestContext`] into the request
//! extensions; later stages fill in the deadline and the resolved caller.

use crate::WEB_SOURCE;
use axum::http::Request;
use serde::Serialize;
use shared_types::{new_request_id, Subject};
use tokio::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const LEGACY_SUBJECT_HEADER: &str = "x-subject-id";

const MAX_REQUEST_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Bearer,
    LegacyHeader,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "bearer",
            Self::LegacyHeader => "legacy_header",
        }
    }
}

/// Identity resolved by the subject stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject_id: String,
    pub roles: Vec<String>,
    pub method: AuthMethod,
}

impl Caller {
    pub fn subject(&self) -> Subject {
        Subject::new(WEB_SOURCE, self.subject_id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    /// Set by the timeout stage.
    pub deadline: Option<Instant>,
    /// Set by the subject stage.
    pub caller: Option<Caller>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline: None,
            caller: None,
        }
    }

    pub fn auth_method(&self) -> &'static str {
        self.caller.as_ref().map_or("", |c| c.method.as_str())
    }
}

/// Apply `f` to the context of `req`, creating one if no stage has yet.
pub fn update_context<B>(req: &mut Request<B>, f: impl FnOnce(&mut RequestContext)) {
    let extensions = req.extensions_mut();
    let mut ctx = extensions
        .remove::<RequestContext>()
        .unwrap_or_else(|| RequestContext::new(new_request_id()));
    f(&mut ctx);
    extensions.insert(ctx);
}

/// Request id already assigned to `req`, or a fresh one.
pub fn request_id_of<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_else(new_request_id)
}

/// Accept a caller-supplied id only if it matches `[A-Za-z0-9._:-]{1,64}`.
pub fn sanitize_request_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    if id.is_empty() || id.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-'))
        .then(|| id.to_string())
}
