//! Periodic host metrics collection.
//!
//! Each tick runs `host status` through the registry, bounded by the job
//! timeout, and stores the payload as the latest `host` metric. A failed
//! tick is logged and the next one proceeds.

use hg_01_module_registry::ModuleRegistry;
use hg_08_host_metrics::MODULE_NAME;
use shared_types::{CommandError, MetricRecord, Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const STATUS_COMMAND: &str = "status";
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum JobError {
    #[error("collection timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("module answered with error {0}")]
    Module(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct MetricsScheduler {
    registry: Arc<ModuleRegistry>,
    store: Arc<dyn Store>,
    interval: Duration,
    job_timeout: Duration,
}

impl MetricsScheduler {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        store: Arc<dyn Store>,
        interval: Duration,
        job_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            interval: if interval.is_zero() {
                DEFAULT_INTERVAL
            } else {
                interval
            },
            job_timeout: if job_timeout.is_zero() {
                DEFAULT_JOB_TIMEOUT
            } else {
                job_timeout
            },
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn job_timeout(&self) -> Duration {
        self.job_timeout
    }

    /// Collect and store one `host` snapshot.
    pub async fn run_once(&self) -> Result<(), JobError> {
        let exec = self.registry.execute(MODULE_NAME, STATUS_COMMAND, &[]);
        let response = tokio::time::timeout(self.job_timeout, exec)
            .await
            .map_err(|_| JobError::Timeout(self.job_timeout))??;
        if response.is_error() {
            return Err(JobError::Module(response.error_code));
        }
        self.store
            .save_metric(MetricRecord::new(MODULE_NAME, response.data))
            .await?;
        debug!(module = MODULE_NAME, "Metric collected");
        Ok(())
    }

    /// Tick until `shutdown` flips to `true` or its sender is dropped. The
    /// first collection runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "Metrics scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(module = MODULE_NAME, error = %err, "Metric collection failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Metrics scheduler stopped");
    }
}
