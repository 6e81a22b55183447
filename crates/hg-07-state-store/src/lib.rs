//! # State Store (HG-07)
//!
//! In-process implementation of the [`Store`] port.
//!
//! Records are only ever appended. Each append is a single critical section
//! on a `parking_lot::RwLock`, so concurrent writers cannot interleave and
//! readers never observe a partially written record.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use shared_types::{AuditEvent, AuditQuery, AuditSink, MetricRecord, Store, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Default)]
pub struct MemoryStore {
    metrics: RwLock<Vec<MetricRecord>>,
    audit: RwLock<Vec<AuditEvent>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent write and read with [`StoreError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn audit_len(&self) -> usize {
        self.audit.read().len()
    }

    pub fn metric_len(&self) -> usize {
        self.metrics.read().len()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn write(&self, event: AuditEvent) -> Result<(), StoreError> {
        self.ensure_open()?;
        debug!(
            request_id = %event.request_id,
            action = %event.action,
            status = %event.status,
            "Audit event recorded"
        );
        self.audit.write().push(event);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_metric(&self, record: MetricRecord) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.metrics.write().push(record);
        Ok(())
    }

    async fn latest_metric(&self, module: &str) -> Result<Option<MetricRecord>, StoreError> {
        self.ensure_open()?;
        let metrics = self.metrics.read();
        // Later appends win ties on timestamp.
        let latest = metrics
            .iter()
            .filter(|rec| rec.module == module)
            .fold(None::<&MetricRecord>, |best, rec| match best {
                Some(b) if b.ts > rec.ts => Some(b),
                _ => Some(rec),
            });
        Ok(latest.cloned())
    }

    async fn query_audit(&self, query: AuditQuery) -> Result<Vec<AuditEvent>, StoreError> {
        self.ensure_open()?;
        let now = Utc::now();
        let mut events: Vec<AuditEvent> = self
            .audit
            .read()
            .iter()
            .filter(|ev| query.matches(ev, now))
            .cloned()
            .collect();
        // Stable sort keeps append order among equal timestamps; reverse it too.
        events.reverse();
        events.sort_by(|a, b| b.ts.cmp(&a.ts));
        events.truncate(query.effective_limit());
        Ok(events)
    }
}
