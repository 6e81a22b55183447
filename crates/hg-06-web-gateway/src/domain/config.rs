//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address, `host:port`
    pub listen_addr: String,
    /// Budget for the whole request after the subject stage starts
    #[serde(with = "shared_types::humantime_serde")]
    pub request_timeout: Duration,
    /// How long `stop` waits for in-flight requests to drain
    #[serde(with = "shared_types::humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Body cap for `POST /v1/commands/execute`
    pub max_body_bytes: usize,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub rate_limit: WebRateLimitConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            request_timeout: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            max_body_bytes: 1 << 20,
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: WebRateLimitConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.trim().is_empty() {
            return Err(ConfigError::EmptyListenAddr);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout cannot be 0".into(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit("max_body_bytes cannot be 0".into()));
        }
        for token in &self.auth.tokens {
            let hash = token.token_sha256.trim();
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::InvalidTokenHash(token.id.clone()));
            }
        }
        Ok(())
    }
}

/// How callers may identify themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Bearer tokens only; the legacy header is never trusted.
    Bearer,
    /// Bearer first, then the legacy header if `allow_legacy_subject_header`.
    Compat,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub allow_legacy_subject_header: bool,
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Compat,
            allow_legacy_subject_header: false,
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn legacy_header_enabled(&self) -> bool {
        self.mode == AuthMode::Compat && self.allow_legacy_subject_header
    }
}

/// A bearer credential, stored only as the SHA-256 of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub id: String,
    /// Lower-hex SHA-256 of the plaintext token (64 chars)
    pub token_sha256: String,
    pub subject: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins; empty means every cross-origin request is refused
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec!["GET".into(), "POST".into(), "OPTIONS".into()],
            allowed_headers: vec![
                "Authorization".into(),
                "Content-Type".into(),
                "X-Request-ID".into(),
            ],
        }
    }
}

/// Per-subject limit on the execute route (key `web:<subject>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebRateLimitConfig {
    pub enabled: bool,
    pub limit: usize,
    #[serde(with = "shared_types::humantime_serde")]
    pub window: Duration,
}

impl Default for WebRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: 5,
            window: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("listen_addr cannot be empty")]
    EmptyListenAddr,
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("token {0}: token_sha256 must be 64 hex characters")]
    InvalidTokenHash(String),
}
