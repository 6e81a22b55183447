//! `hostgate` entry point.

use clap::Parser;
use hostgate_runtime::cli::{run, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    run(Cli::parse()).await
}
