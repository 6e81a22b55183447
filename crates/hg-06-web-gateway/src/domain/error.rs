//! Gateway error codes and the JSON error body.
//!
//! Every error response is `{request_id, status: "error", error_code, message}`
//! with the matching `X-Request-ID` header.

use crate::domain::context::REQUEST_ID_HEADER;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use serde_json::{json, Value};

/// Machine-readable error codes
pub mod codes {
    pub const AUTH_REQUIRED: &str = "auth_required";
    pub const INVALID_TOKEN: &str = "invalid_token";
    pub const ACCESS_DENIED: &str = "access_denied";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const REQUEST_TIMEOUT: &str = "request_timeout";
    pub const CORS_DENIED: &str = "cors_denied";
    pub const CORS_METHOD_DENIED: &str = "cors_method_denied";
    pub const RATE_LIMITED: &str = "rate_limited";
    pub const INVALID_JSON: &str = "invalid_json";
    pub const BAD_COMMAND: &str = "bad_command";
    pub const MODULE_REQUIRED: &str = "module_required";
    pub const METRIC_NOT_FOUND: &str = "metric_not_found";
    pub const BAD_FROM: &str = "bad_from";
    pub const BAD_TO: &str = "bad_to";
    pub const STORE_UNAVAILABLE: &str = "store_unavailable";
    pub const NOT_FOUND: &str = "not_found";
}

/// An HTTP status paired with an error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
        }
    }

    pub fn auth_required() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::AUTH_REQUIRED)
    }

    pub fn invalid_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::INVALID_TOKEN)
    }

    pub fn access_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::ACCESS_DENIED)
    }

    pub fn cors_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::CORS_DENIED)
    }

    pub fn cors_method_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::CORS_METHOD_DENIED)
    }

    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, codes::PAYLOAD_TOO_LARGE)
    }

    pub fn request_timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, codes::REQUEST_TIMEOUT)
    }

    pub fn rate_limited() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, codes::RATE_LIMITED)
    }

    pub fn bad_request(code: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    pub fn not_found(code: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code)
    }

    /// Human-readable message for the code.
    pub fn message(&self) -> &str {
        match self.code.as_str() {
            codes::AUTH_REQUIRED => "authentication is required",
            codes::INVALID_TOKEN => "token is invalid",
            codes::ACCESS_DENIED => "access denied",
            codes::PAYLOAD_TOO_LARGE => "request payload is too large",
            codes::REQUEST_TIMEOUT => "request timeout",
            codes::CORS_DENIED | codes::CORS_METHOD_DENIED => "cors policy denied request",
            codes::RATE_LIMITED => "rate limit exceeded",
            other => other,
        }
    }

    pub fn into_response(self, request_id: &str) -> Response {
        let body = json!({
            "request_id": request_id,
            "status": "error",
            "error_code": &self.code,
            "message": self.message(),
        });
        json_response(self.status, request_id, &body)
    }
}

/// Serialize `body` with the JSON content type and the request-id header.
pub fn json_response(status: StatusCode, request_id: &str, body: &Value) -> Response {
    let mut response = Response::new(Body::from(serde_json::to_vec(body).unwrap_or_default()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    response
}
