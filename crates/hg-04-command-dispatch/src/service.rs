//! # Dispatch Service
//!
//! One instance per transport, bound to that transport's source name.
//! The registry, authorizer, limiter and audit sink are injected and shared
//! with the other transports.

use crate::domain::errors::DispatchError;
use crate::domain::parser::{parse_text_command, ParsedCommand};
use hg_01_module_registry::ModuleRegistry;
use hg_02_authorization::Authorizer;
use hg_03_rate_limiting::RateLimiter;
use serde_json::Value;
use shared_types::{
    command_payload, new_request_id, AuditEvent, AuditSink, AuditStatus, Response, Subject,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Gated command pipeline for a single source.
#[derive(Clone)]
pub struct DispatchService {
    source: String,
    registry: Arc<ModuleRegistry>,
    authorizer: Arc<dyn Authorizer>,
    limiter: Option<Arc<RateLimiter>>,
    audit: Option<Arc<dyn AuditSink>>,
    command_timeout: Option<Duration>,
}

impl DispatchService {
    pub fn new(
        source: impl Into<String>,
        registry: Arc<ModuleRegistry>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            source: source.into(),
            registry,
            authorizer,
            limiter: None,
            audit: None,
            command_timeout: None,
        }
    }

    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Bound module execution; expiry becomes [`DispatchError::Timeout`].
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parse chat text and run it through the pipeline.
    ///
    /// Parse failures are not audited: without a module/command there is no
    /// action to record.
    pub async fn execute_text(
        &self,
        subject_id: &str,
        text: &str,
    ) -> Result<Response, DispatchError> {
        let parsed = parse_text_command(text).inspect_err(|err| {
            debug!(source = %self.source, subject = subject_id, error = %err, "Rejected malformed command");
        })?;
        self.execute(subject_id, parsed).await
    }

    /// Run an already-parsed command through authorize -> rate-limit ->
    /// execute, writing exactly one audit record.
    pub async fn execute(
        &self,
        subject_id: &str,
        cmd: ParsedCommand,
    ) -> Result<Response, DispatchError> {
        let request_id = new_request_id();
        let subject = Subject::new(self.source.clone(), subject_id);
        let action = cmd.action();
        let payload = command_payload(&action, &cmd.args);

        if let Err(err) = self.authorizer.authorize(&subject, &action) {
            warn!(
                request_id = %request_id,
                subject = %subject,
                action = %action,
                reason = %err,
                "Command denied"
            );
            self.write_audit(&subject, &action.to_string(), AuditStatus::Denied, &request_id, payload)
                .await;
            return Err(err.into());
        }

        if let Some(limiter) = &self.limiter {
            let key = subject.limiter_key();
            if !limiter.allow(&key, Instant::now()) {
                warn!(request_id = %request_id, key = %key, action = %action, "Command rate limited");
                self.write_audit(
                    &subject,
                    &action.to_string(),
                    AuditStatus::RateLimited,
                    &request_id,
                    payload,
                )
                .await;
                return Err(DispatchError::RateLimited { key });
            }
        }

        let exec = self.registry.execute(&cmd.module, &cmd.command, &cmd.args);
        let result = match self.command_timeout {
            Some(limit) => match tokio::time::timeout(limit, exec).await {
                Ok(result) => result.map_err(DispatchError::from),
                Err(_) => Err(DispatchError::Timeout(limit)),
            },
            None => exec.await.map_err(DispatchError::from),
        };

        let (status, payload) = match &result {
            Ok(resp) if !resp.is_error() => (AuditStatus::Ok, payload),
            Ok(resp) => (AuditStatus::Error, with_error_code(payload, &resp.error_code)),
            Err(err) => (AuditStatus::Error, with_error_code(payload, err.error_code())),
        };
        match &result {
            Ok(_) => info!(request_id = %request_id, subject = %subject, action = %action, status = %status, "Command executed"),
            Err(err) => warn!(request_id = %request_id, subject = %subject, action = %action, error = %err, "Command failed"),
        }
        self.write_audit(&subject, &action.to_string(), status, &request_id, payload)
            .await;
        result
    }

    async fn write_audit(
        &self,
        subject: &Subject,
        action: &str,
        status: AuditStatus,
        request_id: &str,
        payload: Value,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };
        let event = AuditEvent::new(subject, action, status, request_id, payload);
        if let Err(err) = sink.write(event).await {
            warn!(request_id, action, error = %err, "Audit write failed");
        }
    }
}

fn with_error_code(mut payload: Value, code: &str) -> Value {
    if let Value::Object(map) = &mut payload {
        map.insert("error_code".into(), Value::String(code.to_string()));
    }
    payload
}
