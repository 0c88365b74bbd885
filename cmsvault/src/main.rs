//! cmsvault command-line entry point.
//!
//! # Security Guarantees
//! - Only GET requests are sent to the CMS
//! - API keys are read from the environment and never logged
//! - Backup artifacts are checked for credential leaks before they are written

use clap::Parser;
use cmsvault::{Cli, run};
use cmsvault_core::config::from_process_env;
use cmsvault_core::logging::init_logging;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet, cli.global.log_format.into())?;

    run(&cli, &from_process_env()).await
}
