//! Terminal output for backup results and configured environments.
//!
//! Everything here renders to a `String` so the binary decides where it
//! goes and tests can inspect it. Nothing rendered includes an API key.

use cmsvault_core::config::VaultConfig;
use cmsvault_core::models::BackupResult;
use serde::Serialize;
use std::fmt::Write;
use tabled::builder::Builder;
use tabled::settings::Style;

const RESULT_HEADER: [&str; 8] = [
    "ENVIRONMENT",
    "STATUS",
    "COLLECTIONS",
    "RECORDS",
    "FAILED",
    "SKIPPED",
    "DURATION",
    "PATH",
];

/// Renders one row per run plus the errors and warnings of each run.
pub fn render_summary(results: &[BackupResult]) -> String {
    let mut builder = Builder::new();
    builder.push_record(RESULT_HEADER.map(String::from));
    for result in results {
        let stats = &result.statistics;
        builder.push_record([
            result.environment.clone(),
            if result.success { "ok" } else { "FAILED" }.to_string(),
            stats.total_collections.to_string(),
            stats.total_records.to_string(),
            stats.failed_collections.to_string(),
            stats.skipped_collections.to_string(),
            format!("{}ms", stats.duration_ms()),
            result
                .backup_path
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string()),
        ]);
    }

    let mut out = render_table(builder);

    for result in results {
        let stats = &result.statistics;
        if stats.errors.is_empty() && stats.warnings.is_empty() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", result.environment);
        for entry in &stats.errors {
            let _ = writeln!(
                out,
                "  error [{}] {}: {}",
                entry.phase,
                entry.collection.as_deref().unwrap_or("-"),
                entry.error
            );
        }
        for warning in &stats.warnings {
            let _ = writeln!(out, "  warning: {}", warning);
        }
    }

    out
}

/// One configured environment, without its credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentListing {
    pub name: String,
    pub url: String,
    pub auth_scheme: String,
}

/// Configured environments with redacted URLs, sorted by name
pub fn environment_listings(config: &VaultConfig) -> Vec<EnvironmentListing> {
    config
        .environments
        .values()
        .map(|env| EnvironmentListing {
            name: env.name.clone(),
            url: env.redacted_url(),
            auth_scheme: env.auth_scheme.clone(),
        })
        .collect()
}

/// Renders the configured environments with redacted URLs.
pub fn render_environments(config: &VaultConfig) -> String {
    let listings = environment_listings(config);
    if listings.is_empty() {
        return "No environments configured. Set CMSVAULT_<ENV>_URL and CMSVAULT_<ENV>_API_KEY.\n"
            .to_string();
    }

    let mut builder = Builder::new();
    builder.push_record(["ENVIRONMENT", "URL", "AUTH SCHEME"].map(String::from));
    for listing in listings {
        builder.push_record([listing.name, listing.url, listing.auth_scheme]);
    }
    render_table(builder)
}

/// Pretty JSON for `--json` output
///
/// # Errors
/// Returns error if `value` cannot be serialized
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

fn render_table(builder: Builder) -> String {
    let mut table = builder.build();
    table.with(Style::rounded());
    format!("{table}\n")
}
