//! # Web Gateway (HG-06)
//!
//! HTTP realization of the dispatch pipeline.
//!
//! ## Request pipeline
//!
//! ```text
//! RequestId -> SensitiveHeaders -> Cors -> [route]
//!     /v1/health                              -> handler
//!     /v1/*      Timeout -> Subject -> Authorize -> handler
//! ```
//!
//! - **RequestId**: accepts `X-Request-ID` matching `[A-Za-z0-9._:-]{1,64}`,
//!   otherwise generates one; echoes it on every response.
//! - **Cors**: unknown origins get `403 cors_denied` before anything else runs.
//! - **Timeout**: stamps a deadline on the request context; handlers map
//!   expiry to `504 request_timeout` and audit it.
//! - **Subject**: bearer token (SHA-256 matched) or, when configured, the
//!   legacy `X-Subject-ID` header. Failure is `401`.
//! - **Authorize**: route action through the shared authorizer. Failure is
//!   `403` plus a `denied` audit record.
//!
//! The execute route authorizes inside its handler, since the action comes
//! from the (size-capped) request body.

pub mod audit;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod service;

pub use audit::Auditor;
pub use domain::config::{
    AuthConfig, AuthMode, ConfigError, CorsConfig, GatewayConfig, TokenEntry, WebRateLimitConfig,
};
pub use domain::context::{AuthMethod, Caller, RequestContext};
pub use domain::error::ApiError;
pub use domain::tokens::{hash_token, TokenTable};
pub use service::{build_router, GatewayState, WebTransport};

/// Source name for every subject resolved over HTTP.
pub const WEB_SOURCE: &str = "web";
