//! # Persistent Records
//!
//! Audit events and metric snapshots. Both are write-once: constructed with
//! their timestamp, handed to a store, never mutated afterwards.

use crate::entities::{Action, Subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default number of audit events returned by a query.
pub const DEFAULT_AUDIT_LIMIT: usize = 50;
/// Upper bound on audit events returned by a query.
pub const MAX_AUDIT_LIMIT: usize = 200;

/// Terminal outcome recorded for an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Ok,
    Denied,
    RateLimited,
    Error,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Denied => "denied",
            Self::RateLimited => "rate_limited",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one authorization decision or execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Caller identity (the subject id, without its source).
    pub subject: String,
    /// `module:command` the attempt targeted.
    pub action: String,
    pub source: String,
    pub status: AuditStatus,
    pub request_id: String,
    /// Opaque JSON describing the attempt.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl AuditEvent {
    /// Stamp a new event with the current time.
    pub fn new(
        subject: &Subject,
        action: impl Into<String>,
        status: AuditStatus,
        request_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            subject: subject.id.clone(),
            action: action.into(),
            source: subject.source.clone(),
            status,
            request_id: request_id.into(),
            payload,
            ts: Utc::now(),
        }
    }

    /// Override the timestamp (imports and tests).
    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = ts;
        self
    }
}

/// Latest collected payload for a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub module: String,
    pub payload: Value,
    pub ts: DateTime<Utc>,
}

impl MetricRecord {
    pub fn new(module: impl Into<String>, payload: Value) -> Self {
        Self {
            module: module.into(),
            payload,
            ts: Utc::now(),
        }
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = ts;
        self
    }
}

/// Filter for reading back the audit trail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditQuery {
    /// Only events for this subject id; `None` or empty matches all.
    pub subject: Option<String>,
    /// Inclusive lower bound; defaults to the epoch.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound; defaults to now.
    pub to: Option<DateTime<Utc>>,
    /// Zero selects [`DEFAULT_AUDIT_LIMIT`].
    pub limit: usize,
}

impl AuditQuery {
    /// Limit after applying the default and the upper clamp.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            0 => DEFAULT_AUDIT_LIMIT,
            n => n.min(MAX_AUDIT_LIMIT),
        }
    }

    /// Whether `event` falls inside this query's subject and time filters.
    pub fn matches(&self, event: &AuditEvent, now: DateTime<Utc>) -> bool {
        if let Some(subject) = self.subject.as_deref() {
            if !subject.is_empty() && event.subject != subject {
                return false;
            }
        }
        let from = self.from.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let to = self.to.unwrap_or(now);
        event.ts >= from && event.ts <= to
    }
}

/// Convenience for the common `{module, command, args}` audit payload.
pub fn command_payload(action: &Action, args: &[String]) -> Value {
    serde_json::json!({
        "module": action.module,
        "command": action.command,
        "args": args,
    })
}
