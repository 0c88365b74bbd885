//! Core data models for CMS backups.
//!
//! This module defines the wire shapes of the remote API (access descriptor,
//! pages, counts) and the run-level records produced by a backup (schema
//! descriptors, statistics, results, manifests). Everything here is
//! serializable; none of it ever carries the API credential.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Version of the on-disk artifact format
pub const FORMAT_VERSION: &str = "1.0";

/// Permission snapshot returned by `GET /access`.
///
/// Only the collection names are used; the permission objects are kept
/// verbatim for the metadata manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDescriptor {
    #[serde(default)]
    pub can_access_admin: bool,
    #[serde(default)]
    pub collections: BTreeMap<String, Value>,
}

impl AccessDescriptor {
    /// Names of the collections visible to the current credential
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }
}

/// Body of `GET /{collection}/count`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountResponse {
    pub total_docs: u64,
}

/// One paginated response from `GET /{collection}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub docs: Vec<Value>,
    #[serde(default)]
    pub total_docs: u64,
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub next_page: Option<u64>,
}

/// Query parameters for a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u64,
    /// Documents per page
    pub limit: u32,
    /// Relationship population depth, forwarded verbatim
    pub depth: Option<u32>,
    /// Sort expression, forwarded verbatim
    pub sort: Option<String>,
}

impl PageQuery {
    /// Creates a query for `page` with `limit` documents and no depth or sort
    pub fn new(page: u64, limit: u32) -> Self {
        Self {
            page,
            limit,
            depth: None,
            sort: None,
        }
    }

    /// Builder method to set the depth parameter
    pub fn with_depth(mut self, depth: Option<u32>) -> Self {
        self.depth = depth;
        self
    }

    /// Builder method to set the sort parameter
    pub fn with_sort(mut self, sort: Option<String>) -> Self {
        self.sort = sort;
        self
    }

    /// Renders the query as URL query pairs in a stable order
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(depth) = self.depth {
            pairs.push(("depth", depth.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        pairs
    }
}

/// Structural kind of a JSON value.
///
/// Used by schema inference instead of runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Sequence,
    Mapping,
}

impl ValueKind {
    /// Classifies a parsed JSON value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Sequence,
            Value::Object(_) => Self::Mapping,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Null => write!(f, "null"),
            ValueKind::Boolean => write!(f, "boolean"),
            ValueKind::Number => write!(f, "number"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Sequence => write!(f, "sequence"),
            ValueKind::Mapping => write!(f, "mapping"),
        }
    }
}

/// A top-level field observed in a sampled document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub value_kind: ValueKind,
    /// False when the sampled value was null
    pub has_value: bool,
}

/// Field layout of a collection inferred from a single sampled document.
///
/// The layout is a heuristic: fields missing from the sample, or whose kind
/// varies between documents, are not represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub collection: String,
    pub fields: Vec<FieldDescriptor>,
    pub total_docs: u64,
    pub sample_doc: Option<Value>,
    /// Set when the sample request failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub inferred_at: DateTime<Utc>,
}

impl SchemaDescriptor {
    /// Creates an empty descriptor for a collection without documents
    pub fn empty(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            fields: Vec::new(),
            total_docs: 0,
            sample_doc: None,
            error: None,
            inferred_at: Utc::now(),
        }
    }

    /// Creates a descriptor recording a failed sample request
    pub fn failed(collection: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::empty(collection)
        }
    }

    /// True when the sample request failed
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Result of probing one collection during discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Document count at discovery time; never reconciled afterwards
    pub count: u64,
    pub schema: SchemaDescriptor,
    pub has_data: bool,
}

impl CollectionInfo {
    /// Creates collection info, deriving `has_data` from the count
    pub fn new(name: impl Into<String>, count: u64, schema: SchemaDescriptor) -> Self {
        Self {
            name: name.into(),
            count,
            schema,
            has_data: count > 0,
        }
    }
}

/// Pipeline phase an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Configuration,
    Connection,
    Discovery,
    Backup,
    General,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Configuration => write!(f, "configuration"),
            Phase::Connection => write!(f, "connection"),
            Phase::Discovery => write!(f, "discovery"),
            Phase::Backup => write!(f, "backup"),
            Phase::General => write!(f, "general"),
        }
    }
}

/// An error captured as data during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupErrorEntry {
    pub collection: Option<String>,
    pub phase: Phase,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

/// Run-level statistics, owned by the orchestrator for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupStats {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_collections: usize,
    pub total_records: u64,
    pub successful_collections: usize,
    pub failed_collections: usize,
    pub skipped_collections: usize,
    pub filtered_collections: usize,
    pub errors: Vec<BackupErrorEntry>,
    /// Non-failing notes (truncated pagination, count drift, schema probe errors)
    pub warnings: Vec<String>,
}

impl Default for BackupStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BackupStats {
    /// Creates statistics with the start time set to now
    pub fn new() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
            total_collections: 0,
            total_records: 0,
            successful_collections: 0,
            failed_collections: 0,
            skipped_collections: 0,
            filtered_collections: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Appends an error entry
    pub fn record_error(&mut self, collection: Option<&str>, phase: Phase, error: impl Into<String>) {
        self.errors.push(BackupErrorEntry {
            collection: collection.map(str::to_string),
            phase,
            error: error.into(),
            occurred_at: Utc::now(),
        });
    }

    /// Appends a warning
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Marks the end of the run
    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Overall success signal: no failed collection and no recorded error
    pub fn is_successful(&self) -> bool {
        self.failed_collections == 0 && self.errors.is_empty()
    }

    /// Number of errors attributed to a phase
    pub fn errors_in(&self, phase: Phase) -> usize {
        self.errors.iter().filter(|e| e.phase == phase).count()
    }

    /// Run duration in milliseconds, zero while the run is in progress
    pub fn duration_ms(&self) -> u64 {
        self.end_time
            .map(|end| {
                u64::try_from(end.signed_duration_since(self.start_time).num_milliseconds())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

/// Per-collection line of a backup result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub name: String,
    /// Count reported during discovery
    pub record_count: u64,
    /// Documents actually persisted, `None` when retrieval was not attempted
    pub retrieved_count: Option<u64>,
    pub backup_success: bool,
    pub skipped: bool,
    /// Data file name under `data/`, set once the documents are written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
}

/// Final report of one backup run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupResult {
    pub success: bool,
    pub environment: String,
    pub backup_path: Option<PathBuf>,
    pub statistics: BackupStats,
    pub collections: Vec<CollectionOutcome>,
}

impl BackupResult {
    /// Builds a result, deriving `success` from the statistics
    pub fn from_run(
        environment: impl Into<String>,
        backup_path: Option<PathBuf>,
        statistics: BackupStats,
        collections: Vec<CollectionOutcome>,
    ) -> Self {
        Self {
            success: statistics.is_successful(),
            environment: environment.into(),
            backup_path,
            statistics,
            collections,
        }
    }

    /// Builds an unsuccessful result with no backup path
    pub fn aborted(environment: impl Into<String>, statistics: BackupStats) -> Self {
        Self {
            success: false,
            environment: environment.into(),
            backup_path: None,
            statistics,
            collections: Vec::new(),
        }
    }
}

/// One collection as recorded in the metadata manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCollection {
    pub name: String,
    pub count: u64,
    pub has_data: bool,
    pub field_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
}

impl From<&CollectionInfo> for ManifestCollection {
    fn from(info: &CollectionInfo) -> Self {
        Self {
            name: info.name.clone(),
            count: info.count,
            has_data: info.has_data,
            field_count: info.schema.fields.len(),
            schema_error: info.schema.error.clone(),
        }
    }
}

/// Request budget used for a run, as recorded in the manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRateLimit {
    pub concurrency: usize,
    pub delay_ms: u64,
    pub batch_size: u32,
    pub timeout_ms: u64,
}

/// Metadata manifest written once per run after discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub format_version: String,
    pub run_id: uuid::Uuid,
    pub environment: String,
    /// Redacted base URL of the remote API
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
    pub can_access_admin: bool,
    pub depth: Option<u32>,
    pub rate_limit: ManifestRateLimit,
    pub collections: Vec<ManifestCollection>,
    pub filtered_collections: Vec<String>,
}

impl BackupMetadata {
    /// Creates a manifest for a new run
    pub fn new(
        environment: impl Into<String>,
        source: impl Into<String>,
        rate_limit: ManifestRateLimit,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            run_id: uuid::Uuid::new_v4(),
            environment: environment.into(),
            source: source.into(),
            created_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            can_access_admin: false,
            depth: None,
            rate_limit,
            collections: Vec::new(),
            filtered_collections: Vec::new(),
        }
    }

    /// Total documents reported by discovery across all collections
    pub fn discovered_records(&self) -> u64 {
        self.collections
            .iter()
            .fold(0_u64, |acc, c| acc.saturating_add(c.count))
    }
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
