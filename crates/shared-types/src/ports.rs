//! # Ports
//!
//! Contracts between the dispatch core and everything it talks to:
//! command providers (modules), transports (front-ends) and the state store.

use crate::entities::Response;
use crate::errors::{AdapterError, CommandError, StoreError};
use crate::records::{AuditEvent, AuditQuery, MetricRecord};
use async_trait::async_trait;

/// A named, independently registered command implementation.
#[async_trait]
pub trait CommandProvider: Send + Sync {
    /// Registry key; must be non-empty and unique.
    fn name(&self) -> &str;

    /// One-time initialization, run by the registry before insertion.
    async fn init(&self) -> Result<(), CommandError> {
        Ok(())
    }

    /// Execute `command` with positional `args`.
    ///
    /// A business failure may be reported either as `Ok(Response::error(..))`
    /// or as `Err(CommandError)`; transports audit both as `error`.
    async fn execute(&self, command: &str, args: &[String]) -> Result<Response, CommandError>;
}

/// A front-end that accepts external input and owns its own lifecycle.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self) -> Result<(), AdapterError>;

    async fn stop(&self) -> Result<(), AdapterError>;
}

/// Append-only sink for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, event: AuditEvent) -> Result<(), StoreError>;
}

/// Narrow save/query interface over the persistent store.
#[async_trait]
pub trait Store: AuditSink {
    async fn save_metric(&self, record: MetricRecord) -> Result<(), StoreError>;

    async fn latest_metric(&self, module: &str) -> Result<Option<MetricRecord>, StoreError>;

    /// Events matching `query`, newest first, bounded by its effective limit.
    async fn query_audit(&self, query: AuditQuery) -> Result<Vec<AuditEvent>, StoreError>;
}
