//! # Transport Manager (HG-05)
//!
//! Owns the lifecycle of every registered front-end.
//!
//! ## Concurrency
//!
//! The adapter map sits behind a single mutex that is held only while
//! snapshotting or mutating the map. `start`/`stop` are always invoked on a
//! snapshot with the lock released, so a slow adapter never blocks
//! registration or inspection of the others.
//!
//! ## Failure semantics
//!
//! - `start_all` stops at the first failure; adapters already started are
//!   left running (no rollback).
//! - `stop_all` calls `stop` on every adapter and reports the first failure.

use parking_lot::Mutex;
use shared_types::{AdapterError, TransportAdapter};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport name is empty")]
    EmptyName,

    #[error("transport {0} already registered")]
    Duplicate(String),

    #[error("unknown transport {0}")]
    Unknown(String),

    #[error("start transport {name}: {source}")]
    Start {
        name: String,
        #[source]
        source: AdapterError,
    },

    #[error("stop transport {name}: {source}")]
    Stop {
        name: String,
        #[source]
        source: AdapterError,
    },
}

/// Registry and lifecycle driver for transports, iterated in name order.
#[derive(Default)]
pub struct TransportManager {
    adapters: Mutex<BTreeMap<String, Arc<dyn TransportAdapter>>>,
}

impl TransportManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, adapter: Arc<dyn TransportAdapter>) -> Result<(), TransportError> {
        let name = adapter.name().to_string();
        if name.is_empty() {
            return Err(TransportError::EmptyName);
        }
        let mut adapters = self.adapters.lock();
        if adapters.contains_key(&name) {
            return Err(TransportError::Duplicate(name));
        }
        info!(transport = %name, "[Transports] Registered transport");
        adapters.insert(name, adapter);
        Ok(())
    }

    /// Registered transport names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.adapters.lock().keys().cloned().collect()
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn TransportAdapter>)> {
        self.adapters
            .lock()
            .iter()
            .map(|(name, adapter)| (name.clone(), Arc::clone(adapter)))
            .collect()
    }

    pub async fn start_all(&self) -> Result<(), TransportError> {
        for (name, adapter) in self.snapshot() {
            if let Err(source) = adapter.start().await {
                error!(transport = %name, error = %source, "[Transports] Start failed, aborting");
                return Err(TransportError::Start { name, source });
            }
            info!(transport = %name, "[Transports] Started");
        }
        Ok(())
    }

    pub async fn stop_all(&self) -> Result<(), TransportError> {
        let mut first_err = None;
        for (name, adapter) in self.snapshot() {
            match adapter.stop().await {
                Ok(()) => info!(transport = %name, "[Transports] Stopped"),
                Err(source) => {
                    warn!(transport = %name, error = %source, "[Transports] Stop failed");
                    if first_err.is_none() {
                        first_err = Some(TransportError::Stop { name, source });
                    }
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    pub async fn stop_one(&self, name: &str) -> Result<(), TransportError> {
        let adapter = self
            .adapters
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::Unknown(name.to_string()))?;
        adapter.stop().await.map_err(|source| TransportError::Stop {
            name: name.to_string(),
            source,
        })
    }
}
