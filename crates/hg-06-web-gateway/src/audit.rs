//! Best-effort audit writer for HTTP outcomes.

use crate::domain::context::RequestContext;
use crate::WEB_SOURCE;
use serde_json::Value;
use shared_types::{AuditEvent, AuditStatus, Store, Subject};
use std::sync::Arc;
use tracing::warn;

/// Writes one audit record per HTTP outcome. Write failures are logged and
/// never alter the response.
#[derive(Clone)]
pub struct Auditor {
    store: Arc<dyn Store>,
}

impl Auditor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record(
        &self,
        ctx: &RequestContext,
        action: &str,
        status: AuditStatus,
        mut payload: Value,
    ) {
        let subject = ctx
            .caller
            .as_ref()
            .map(|caller| caller.subject())
            .unwrap_or_else(|| Subject::new(WEB_SOURCE, ""));
        if let Value::Object(map) = &mut payload {
            map.insert("auth_method".into(), Value::from(ctx.auth_method()));
        }
        let event = AuditEvent::new(&subject, action, status, ctx.request_id.clone(), payload);
        if let Err(err) = self.store.write(event).await {
            warn!(request_id = %ctx.request_id, action, error = %err, "Audit write failed");
        }
    }
}
