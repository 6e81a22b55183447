//! Command line front-end.
//!
//! ```text
//! hostgate [--config PATH] serve
//! hostgate [--config PATH] exec [--subject ID] <module> <command> [args...]
//! hostgate hash-token <token>
//! hostgate version
//! ```

use crate::app::App;
use crate::config::RuntimeConfig;
use crate::logging::init_logging;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hg_04_command_dispatch::DispatchError;
use serde_json::{json, Value};
use shared_types::Response;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "hostgate")]
#[command(about = "Privileged host administration behind an audited command pipeline")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "HOSTGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Print the version
    Version,
    /// Run every enabled transport until Ctrl-C
    Serve,
    /// Run one command through the `cli` pipeline
    Exec {
        module: String,
        command: String,
        args: Vec<String>,
        /// Subject id, defaults to $USER
        #[arg(long, env = "USER")]
        subject: Option<String>,
    },
    /// Print the SHA-256 of a bearer token for `[[web.auth.tokens]]`
    HashToken { token: String },
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Version => {
            println!("hostgate {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
        Command::HashToken { token } => {
            println!("{}", hg_06_web_gateway::hash_token(token.trim()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Serve => {
            let config = RuntimeConfig::load(cli.config.as_deref())?;
            init_logging(&config.agent)?;
            let app = App::build(config).await?;
            app.serve(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(error = %err, "Failed to listen for Ctrl-C");
                }
            })
            .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Exec {
            module,
            command,
            args,
            subject,
        } => {
            let subject = subject
                .filter(|s| !s.trim().is_empty())
                .context("no subject: pass --subject or set USER")?;
            let config = RuntimeConfig::load(cli.config.as_deref())?;
            init_logging(&config.agent)?;
            let app = App::build(config).await?;

            let result = app.exec(&subject, &module, &command, args).await;
            let failed = result.is_err() || result.as_ref().is_ok_and(Response::is_error);
            let body = render(&result);
            println!(
                "{}",
                serde_json::to_string_pretty(&body).context("failed to encode response")?
            );
            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

/// JSON shape printed by `exec`.
pub fn render(result: &Result<Response, DispatchError>) -> Value {
    match result {
        Ok(response) => json!(response),
        Err(err) => json!({
            "status": "error",
            "error_code": err.error_code(),
            "message": err.to_string(),
        }),
    }
}
