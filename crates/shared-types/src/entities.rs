//! # Core Entities
//!
//! Per-request value objects: who is calling (`Subject`), what they want
//! (`Action`), and the uniform envelope every module answers with
//! (`Response`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The (front-end source, caller identity) pair making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// Transport the request arrived through (`telegram`, `web`, `cli`, ...).
    pub source: String,
    /// Caller identity within that source.
    pub id: String,
}

impl Subject {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }

    /// Rate-limiter key, `source:id`.
    pub fn limiter_key(&self) -> String {
        format!("{}:{}", self.source, self.id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

/// The (module, command) pair identifying what is being requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    pub module: String,
    pub command: String,
}

impl Action {
    pub fn new(module: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            command: command.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.command)
    }
}

/// Outcome flag carried by every [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Uniform result envelope returned by every module and echoed by every
/// transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_code: String,
}

impl Response {
    /// Successful response carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            status: ResponseStatus::Ok,
            data,
            error_code: String::new(),
        }
    }

    /// Business-level failure with a module-defined error code.
    pub fn error(error_code: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            data: Value::Null,
            error_code: error_code.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }
}
