//! Tracing subscriber setup.

use crate::config::{AgentConfig, LogFormat};
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level.
pub fn env_filter(agent: &AgentConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&agent.log_level))
        .with_context(|| format!("invalid log level {:?}", agent.log_level))
}

/// Install the global subscriber. Logs go to stderr so CLI output on stdout
/// stays machine-readable.
pub fn init_logging(agent: &AgentConfig) -> Result<()> {
    let filter = env_filter(agent)?;

    match agent.log_format {
        LogFormat::Json => {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
    }
    .context("failed to install tracing subscriber")
}
