//! CORS stage.
//!
//! Unlike a permissive CORS layer this one rejects: a request whose `Origin`
//! is not allow-listed gets `403 cors_denied` and never reaches routing.
//! Requests without an `Origin` header pass untouched.

use crate::domain::config::CorsConfig;
use crate::domain::context::request_id_of;
use crate::domain::error::ApiError;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

/// Normalized CORS allow-sets.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: HashSet<String>,
    methods: Vec<String>,
    allow_methods: String,
    allow_headers: String,
}

impl CorsPolicy {
    /// Empty method/header lists fall back to the defaults.
    pub fn new(config: &CorsConfig) -> Self {
        let defaults = CorsConfig::default();
        let methods = if config.allowed_methods.is_empty() {
            defaults.allowed_methods
        } else {
            config.allowed_methods.clone()
        };
        let headers = if config.allowed_headers.is_empty() {
            defaults.allowed_headers
        } else {
            config.allowed_headers.clone()
        };
        let methods: Vec<String> = methods.iter().map(|m| m.trim().to_string()).collect();
        Self {
            origins: config
                .allowed_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            allow_methods: methods.join(", "),
            allow_headers: headers.join(", "),
            methods,
        }
    }

    pub fn allows_origin(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    fn apply_headers(&self, origin: &str, headers: &mut HeaderMap) {
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.allow_methods) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.allow_headers) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
        }
    }
}

#[derive(Clone)]
pub struct CorsLayer {
    policy: Arc<CorsPolicy>,
}

impl CorsLayer {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            policy: Arc::new(CorsPolicy::new(config)),
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService {
            inner,
            policy: Arc::clone(&self.policy),
        }
    }
}

#[derive(Clone)]
pub struct CorsService<S> {
    inner: S,
    policy: Arc<CorsPolicy>,
}

impl<S> Service<Request<Body>> for CorsService<S>
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

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let policy = Arc::clone(&self.policy);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string();
            if origin.is_empty() {
                return inner.call(req).await;
            }

            let request_id = request_id_of(&req);
            if !policy.allows_origin(&origin) {
                warn!(origin = %origin, "CORS origin denied");
                return Ok(ApiError::cors_denied().into_response(&request_id));
            }

            if req.method() == Method::OPTIONS {
                let requested = req
                    .headers()
                    .get(header::ACCESS_CONTROL_REQUEST_METHOD)
                    .and_then(|v| v.to_str().ok())
                    .map(str::trim)
                    .unwrap_or_default();
                let mut response = if !requested.is_empty() && !policy.allows_method(requested) {
                    warn!(origin = %origin, method = requested, "CORS preflight method denied");
                    ApiError::cors_method_denied().into_response(&request_id)
                } else {
                    let mut ok = Response::new(Body::empty());
                    *ok.status_mut() = StatusCode::NO_CONTENT;
                    ok
                };
                policy.apply_headers(&origin, response.headers_mut());
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            policy.apply_headers(&origin, response.headers_mut());
            Ok(response)
        })
    }
}
