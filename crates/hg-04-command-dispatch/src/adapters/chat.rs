//! Chat-bot transports (`telegram`, `maxbot`).
//!
//! The network protocols are not spoken here; a bot frontend hands each
//! incoming message to [`ChatTransport::handle_command`]. The adapter owns
//! only start/stop bookkeeping. All gating lives in the dispatch service.

use crate::domain::errors::DispatchError;
use crate::service::DispatchService;
use async_trait::async_trait;
use shared_types::{AdapterError, Response, TransportAdapter};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

pub const TELEGRAM: &str = "telegram";
pub const MAXBOT: &str = "maxbot";

pub struct ChatTransport {
    dispatch: DispatchService,
    running: AtomicBool,
}

impl ChatTransport {
    /// Transport named after the dispatch service's source.
    pub fn new(dispatch: DispatchService) -> Self {
        Self {
            dispatch,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one chat message from `user_id` through the pipeline.
    pub async fn handle_command(&self, user_id: &str, text: &str) -> Result<Response, DispatchError> {
        self.dispatch.execute_text(user_id, text).await
    }
}

#[async_trait]
impl TransportAdapter for ChatTransport {
    fn name(&self) -> &str {
        self.dispatch.source()
    }

    async fn start(&self) -> Result<(), AdapterError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AdapterError::AlreadyStarted(self.name().to_string()));
        }
        info!(transport = self.name(), "Chat transport started");
        Ok(())
    }

    async fn stop(&self) -> Result<(), AdapterError> {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(transport = self.name(), "Chat transport stopped");
        }
        Ok(())
    }
}
