//! # Runtime Configuration
//!
//! TOML file, then `HOSTGATE_*` environment overrides, then validation.
//! Every section is optional; missing keys take the defaults below.
//!
//! ```toml
//! [agent]
//! log_level = "info"
//! log_format = "json"
//!
//! [security.auth_allowlist]
//! telegram = ["1001"]
//! web = ["alice"]
//!
//! [web]
//! enabled = true
//! listen_addr = "127.0.0.1:8080"
//! request_timeout = "3s"
//!
//! [[web.auth.tokens]]
//! id = "ops"
//! token_sha256 = "..."
//! subject = "alice"
//! ```

use hg_06_web_gateway::{ConfigError as GatewayConfigError, GatewayConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const ENV_LOG_LEVEL: &str = "HOSTGATE_LOG_LEVEL";
pub const ENV_WEB_LISTEN: &str = "HOSTGATE_WEB_LISTEN";
pub const ENV_WEB_ENABLED: &str = "HOSTGATE_WEB_ENABLED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid web configuration: {0}")]
    Web(#[from] GatewayConfigError),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub agent: AgentConfig,
    pub security: SecurityConfig,
    /// Shared limiter for the chat and CLI front-ends.
    pub rate_limit: RateLimitConfig,
    pub scheduler: SchedulerConfig,
    pub transports: TransportsConfig,
    pub web: WebConfig,
}

impl RuntimeConfig {
    /// Load `path` (or the defaults when `None`), apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `HOSTGATE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
            self.agent.log_level = level.trim().to_string();
        }
        if let Some(addr) = lookup(ENV_WEB_LISTEN).filter(|v| !v.trim().is_empty()) {
            self.web.gateway.listen_addr = addr.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_WEB_ENABLED) {
            match parse_bool(&raw) {
                Some(enabled) => self.web.enabled = enabled,
                None => warn!(key = ENV_WEB_ENABLED, value = %raw, "Ignoring non-boolean override"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.web.gateway.validate()?;
        Ok(())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// `source -> allowed subject ids`
    pub auth_allowlist: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Non-positive values are treated as 1.
    pub limit: i64,
    #[serde(with = "shared_types::humantime_serde")]
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn effective_limit(&self) -> usize {
        usize::try_from(self.limit.max(1)).unwrap_or(usize::MAX)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Zero falls back to one minute.
    #[serde(with = "shared_types::humantime_serde")]
    pub interval: Duration,
    #[serde(with = "shared_types::humantime_serde")]
    pub job_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            job_timeout: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportsConfig {
    pub telegram: bool,
    pub maxbot: bool,
}

impl Default for TransportsConfig {
    fn default() -> Self {
        Self {
            telegram: true,
            maxbot: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub gateway: GatewayConfig,
}
