//! Library module for the cmsvault binary.
//!
//! Holds the command-line definition and the command runners so they can be
//! tested without spawning a process. `main.rs` only parses arguments,
//! initializes logging and maps the outcome to an exit code.

pub mod output;

use anyhow::{Context, bail};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use cmsvault_core::config::{
    BackupConfig, ConfigResolver, DEFAULT_OUTPUT_DIR, RateLimitConfig, VaultConfig,
};
use cmsvault_core::logging::LogFormat;
use cmsvault_core::orchestrator::BackupOrchestrator;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "cmsvault")]
#[command(about = "Rate-limited backup tool for headless CMS REST APIs")]
#[command(version)]
#[command(long_about = "
cmsvault - Rate-limited CMS backups

Discovers every collection visible to an API key, pages through each one
and writes timestamped JSON artifacts:

  <output-dir>/<env>/<timestamp>/data/<collection>.json
  <output-dir>/<env>/<timestamp>/schemas/<collection>.schema.json
  <output-dir>/<env>/<timestamp>/{metadata.json,summary.json,backup.log}

ENVIRONMENTS:
  CMSVAULT_ENVIRONMENTS        comma-separated names (default: production,staging,development)
  CMSVAULT_<ENV>_URL           API base URL, e.g. https://cms.example.com/api
  CMSVAULT_<ENV>_API_KEY       API key (never logged)
  CMSVAULT_<ENV>_AUTH_SCHEME   Authorization scheme (default: 'users API-Key')

EXAMPLES:
  cmsvault backup staging
  cmsvault backup --all --concurrency 2 --delay-ms 250
  cmsvault test production
")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Back up one or more environments
    Backup(BackupArgs),
    /// Check that an environment is reachable with its credential
    Test(TestArgs),
    /// List configured environments
    List,
}

#[derive(Args)]
#[command(group(ArgGroup::new("targets").required(true).args(["environments", "all"])))]
pub struct BackupArgs {
    /// Environments to back up
    #[arg(value_name = "ENV")]
    pub environments: Vec<String>,

    /// Back up every configured environment
    #[arg(long)]
    pub all: bool,

    #[command(flatten)]
    pub rate_limit: RateLimitArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args)]
pub struct TestArgs {
    /// Environment to test
    #[arg(value_name = "ENV")]
    pub environment: String,

    #[command(flatten)]
    pub rate_limit: RateLimitArgs,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv)"
    )]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all log output except errors")]
    pub quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Text, env = "CMSVAULT_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    /// Print results as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Request budget flags; unset flags keep the library defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct RateLimitArgs {
    /// Maximum simultaneous requests
    #[arg(long, env = "CMSVAULT_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Minimum spacing between requests in milliseconds
    #[arg(long, env = "CMSVAULT_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Documents per page
    #[arg(long, env = "CMSVAULT_BATCH_SIZE")]
    pub batch_size: Option<u32>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "CMSVAULT_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,
}

impl RateLimitArgs {
    /// Applies the flags on top of the defaults
    pub fn to_config(&self) -> RateLimitConfig {
        let mut config = RateLimitConfig::new();
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(delay_ms) = self.delay_ms {
            config = config.with_delay_ms(delay_ms);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Root directory for backup runs
    #[arg(short, long, env = "CMSVAULT_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Relationship population depth
    #[arg(long, env = "CMSVAULT_DEPTH")]
    pub depth: Option<u32>,

    /// Sort expression forwarded to the API
    #[arg(long, env = "CMSVAULT_SORT")]
    pub sort: Option<String>,

    /// Collections to skip (glob patterns, comma-separated)
    #[arg(long, value_delimiter = ',', env = "CMSVAULT_EXCLUDE")]
    pub exclude: Vec<String>,

    /// Write data files zstd-compressed (.json.zst)
    #[arg(long, env = "CMSVAULT_COMPRESS")]
    pub compress: bool,

    /// Fail a collection when pagination stops early
    #[arg(long, env = "CMSVAULT_STRICT_PAGINATION")]
    pub strict_pagination: bool,
}

impl Default for OutputArgs {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            depth: None,
            sort: None,
            exclude: Vec::new(),
            compress: false,
            strict_pagination: false,
        }
    }
}

impl OutputArgs {
    /// Applies the flags on top of the defaults
    pub fn to_config(&self) -> BackupConfig {
        let mut config = BackupConfig::new()
            .with_output_dir(&self.output_dir)
            .with_sort(self.sort.clone())
            .with_compression(self.compress)
            .with_strict_pagination(self.strict_pagination);
        if let Some(depth) = self.depth {
            config = config.with_depth(Some(depth));
        }
        for pattern in &self.exclude {
            config = config.exclude(pattern.trim());
        }
        config
    }
}

/// Resolves the full configuration from a lookup and the command-line flags.
///
/// # Errors
/// Returns error if the flags produce an invalid configuration
pub fn build_config<F>(
    resolver: &ConfigResolver<F>,
    rate_limit: &RateLimitArgs,
    output: &OutputArgs,
) -> anyhow::Result<VaultConfig>
where
    F: Fn(&str) -> Option<String>,
{
    resolver
        .resolve(rate_limit.to_config(), output.to_config())
        .context("Invalid configuration")
}

/// Environment names a `backup` invocation targets
pub fn backup_targets(args: &BackupArgs, config: &VaultConfig) -> anyhow::Result<Vec<String>> {
    let targets = if args.all {
        config.environment_names()
    } else {
        args.environments
            .iter()
            .map(|name| name.trim().to_lowercase())
            .collect()
    };
    if targets.is_empty() {
        bail!("No environments configured. Set CMSVAULT_<ENV>_URL and CMSVAULT_<ENV>_API_KEY.");
    }
    Ok(targets)
}

/// Runs the parsed command against the given configuration lookup.
///
/// Returns the process exit code: success only when every requested run
/// succeeded.
///
/// # Errors
/// Returns error when the configuration cannot be resolved
pub async fn run<F>(cli: &Cli, resolver: &ConfigResolver<F>) -> anyhow::Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    match &cli.command {
        Command::Backup(args) => {
            let config = build_config(resolver, &args.rate_limit, &args.output)?;
            let targets = backup_targets(args, &config)?;
            info!(environments = ?targets, "Starting backups");

            let orchestrator = BackupOrchestrator::new(config);
            let results = orchestrator.perform_backups(&targets).await;

            if cli.global.json {
                print!("{}", output::render_json(&results)?);
            } else {
                print!("{}", output::render_summary(&results));
            }
            if results.iter().all(|r| r.success) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Test(args) => {
            let config = build_config(resolver, &args.rate_limit, &OutputArgs::default())?;
            let orchestrator = BackupOrchestrator::new(config);
            match orchestrator.test_connection(&args.environment).await {
                Ok(access) => {
                    println!(
                        "Connection to '{}' successful: {} collections visible",
                        args.environment.trim().to_lowercase(),
                        access.collections.len()
                    );
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    error!("Connection test failed: {}", e);
                    println!("Connection to '{}' failed: {}", args.environment, e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::List => {
            let config = build_config(resolver, &RateLimitArgs::default(), &OutputArgs::default())?;
            if cli.global.json {
                print!("{}", output::render_json(&output::environment_listings(&config))?);
            } else {
                print!("{}", output::render_environments(&config));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
