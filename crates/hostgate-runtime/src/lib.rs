//! # HostGate Runtime
//!
//! Library half of the `hostgate` binary, exposed for tests.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `HOSTGATE_*` environment overrides)
//! 2. Initialize logging
//! 3. Register modules (`host`) and transports (`telegram`, `maxbot`, `web`)
//! 4. Start transports, the metrics scheduler and the limiter cleanup task
//! 5. On Ctrl-C, stop everything within the shutdown timeout

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod scheduler;

pub use app::{App, CLI_SOURCE};
pub use config::{ConfigError, RuntimeConfig};
pub use scheduler::MetricsScheduler;
