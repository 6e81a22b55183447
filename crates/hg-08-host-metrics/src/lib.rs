//! # Host Metrics (HG-08)
//!
//! The `host` module. `status` reports identity, uptime, memory and load
//! averages for the machine the agent runs on.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use shared_types::{CommandError, CommandProvider, Response};
use sysinfo::System;
use tracing::debug;

pub const MODULE_NAME: &str = "host";

/// Point-in-time view of the host.
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    pub hostname: String,
    pub platform: String,
    pub platform_version: String,
    pub kernel: String,
    pub uptime_sec: u64,
    /// RFC 3339, UTC.
    pub boot_time: String,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_used_pct: f64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

impl HostSnapshot {
    /// Read the current host state. Blocking.
    pub fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let mem_total = sys.total_memory();
        let mem_used = sys.used_memory();
        let mem_used_pct = if mem_total == 0 {
            0.0
        } else {
            mem_used as f64 * 100.0 / mem_total as f64
        };
        let load = System::load_average();
        let boot_time = i64::try_from(System::boot_time())
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        Self {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            platform: System::name().unwrap_or_default(),
            platform_version: System::os_version().unwrap_or_default(),
            kernel: System::kernel_version().unwrap_or_default(),
            uptime_sec: System::uptime(),
            boot_time,
            mem_total,
            mem_used,
            mem_used_pct,
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
        }
    }
}

#[derive(Debug, Default)]
pub struct HostModule;

impl HostModule {
    pub fn new() -> Self {
        Self
    }

    async fn status(&self) -> Result<Response, CommandError> {
        let snapshot = tokio::task::spawn_blocking(HostSnapshot::collect)
            .await
            .map_err(|e| CommandError::failed("host_info_failed", e.to_string()))?;
        debug!(hostname = %snapshot.hostname, "Collected host snapshot");
        let data = serde_json::to_value(snapshot)
            .map_err(|e| CommandError::failed("host_info_failed", e.to_string()))?;
        Ok(Response::ok(data))
    }
}

#[async_trait]
impl CommandProvider for HostModule {
    fn name(&self) -> &str {
        MODULE_NAME
    }

    async fn execute(&self, command: &str, _args: &[String]) -> Result<Response, CommandError> {
        match command {
            "status" => self.status().await,
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}
