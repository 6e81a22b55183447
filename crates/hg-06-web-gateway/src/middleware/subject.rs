//! Subject-resolution stage.
//!
//! Resolves who is calling before any authorization runs. Failure is always
//! `401` and never reaches the authorizer or the audit store.

use crate::domain::config::AuthConfig;
use crate::domain::context::{request_id_of, update_context, AuthMethod, Caller, LEGACY_SUBJECT_HEADER};
use crate::domain::error::ApiError;
use crate::domain::tokens::TokenTable;
use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    response::Response,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{debug, warn};

const BEARER_PREFIX: &str = "bearer ";

/// Maps request headers to a [`Caller`].
#[derive(Debug, Clone)]
pub struct SubjectResolver {
    tokens: TokenTable,
    legacy_enabled: bool,
}

impl SubjectResolver {
    pub fn new(tokens: TokenTable, legacy_enabled: bool) -> Self {
        Self {
            tokens,
            legacy_enabled,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            TokenTable::new(config.tokens.iter().cloned()),
            config.legacy_header_enabled(),
        )
    }

    /// A presented bearer credential is final: a bad token is
    /// `invalid_token` even when the legacy header is also present.
    pub fn resolve(&self, headers: &HeaderMap) -> Result<Caller, ApiError> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();

        let has_bearer = authorization
            .get(..BEARER_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BEARER_PREFIX));
        if has_bearer {
            let token = authorization[BEARER_PREFIX.len()..].trim();
            if token.is_empty() {
                return Err(ApiError::invalid_token());
            }
            let entry = self.tokens.resolve(token).ok_or_else(ApiError::invalid_token)?;
            return Ok(Caller {
                subject_id: entry.subject.clone(),
                roles: entry.roles.clone(),
                method: AuthMethod::Bearer,
            });
        }

        if self.legacy_enabled {
            let subject_id = headers
                .get(LEGACY_SUBJECT_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default();
            if !subject_id.is_empty() {
                return Ok(Caller {
                    subject_id: subject_id.to_string(),
                    roles: Vec::new(),
                    method: AuthMethod::LegacyHeader,
                });
            }
        }

        Err(ApiError::auth_required())
    }
}

#[derive(Clone)]
pub struct SubjectLayer {
    resolver: Arc<SubjectResolver>,
}

impl SubjectLayer {
    pub fn new(resolver: SubjectResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl<S> Layer<S> for SubjectLayer {
    type Service = SubjectService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SubjectService {
            inner,
            resolver: Arc::clone(&self.resolver),
        }
    }
}

#[derive(Clone)]
pub struct SubjectService<S> {
    inner: S,
    resolver: Arc<SubjectResolver>,
}

impl<S> Service<Request<Body>> for SubjectService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let resolver = Arc::clone(&self.resolver);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match resolver.resolve(req.headers()) {
                Ok(caller) => {
                    debug!(
                        subject = %caller.subject_id,
                        auth_method = caller.method.as_str(),
                        "Subject resolved"
                    );
                    update_context(&mut req, |ctx| ctx.caller = Some(caller));
                    inner.call(req).await
                }
                Err(err) => {
                    let request_id = request_id_of(&req);
                    warn!(request_id = %request_id, code = %err.code, "Subject resolution failed");
                    Ok(err.into_response(&request_id))
                }
            }
        })
    }
}
