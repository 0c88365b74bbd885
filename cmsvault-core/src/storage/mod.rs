//! Persistence of backup artifacts.
//!
//! The orchestrator only talks to the [`BackupStore`] trait; the filesystem
//! implementation lays runs out as
//!
//! ```text
//! <output_dir>/<env>/<YYYY-MM-DDTHH-MM-SS.mmmZ>/
//!     data/<collection>.json          (or .json.zst when compressed)
//!     schemas/<collection>.schema.json
//!     metadata.json
//!     backup.log
//!     summary.json
//! ```

mod filesystem;

pub use filesystem::{FsBackupStore, sanitize_file_name};

use crate::models::{BackupMetadata, BackupStats, CollectionOutcome, SchemaDescriptor};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Severity of a `backup.log` entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Durable storage for one or more backup runs.
///
/// `create_structure` must be called for an environment before any other
/// write for that environment; it starts a new run directory each time.
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// Creates the run directory tree and returns its path.
    async fn create_structure(&self, environment: &str) -> crate::Result<PathBuf>;

    /// Writes all documents of a collection and returns the file path.
    async fn save_data(
        &self,
        environment: &str,
        collection: &str,
        docs: &[Value],
    ) -> crate::Result<PathBuf>;

    /// Writes the schema descriptor; `None` when it carries nothing to record.
    async fn save_schema(
        &self,
        environment: &str,
        collection: &str,
        schema: &SchemaDescriptor,
    ) -> crate::Result<Option<PathBuf>>;

    /// Validates and writes the run manifest.
    async fn save_metadata(
        &self,
        environment: &str,
        metadata: &BackupMetadata,
    ) -> crate::Result<PathBuf>;

    /// Appends one structured line to the run log.
    async fn append_log(
        &self,
        environment: &str,
        level: LogLevel,
        message: &str,
        extra: Option<&Value>,
    ) -> crate::Result<()>;

    /// Writes the end-of-run summary.
    async fn generate_summary(
        &self,
        environment: &str,
        collections: &[CollectionOutcome],
        stats: &BackupStats,
    ) -> crate::Result<PathBuf>;

    /// Current run directory of an environment, if one was created
    fn backup_dir(&self, environment: &str) -> Option<PathBuf>;
}
