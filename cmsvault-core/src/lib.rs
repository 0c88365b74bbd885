//! Core library for cmsvault.
//!
//! This crate backs up a remote content-management REST API into
//! timestamped local JSON artifacts. It provides the rate-governed API
//! client, the backup orchestrator and the persistence, configuration and
//! event plumbing around them.
//!
//! # Security Guarantees
//! - Only GET requests are issued against the remote API
//! - API keys are held in zeroizing containers and never logged
//! - URLs are redacted before they reach errors, logs or artifacts
//! - The metadata manifest is validated for credential leaks before it is written
//!
//! # Architecture
//! - `client`: bounded-concurrency, paced API client behind a `Transport` seam
//! - `orchestrator`: validate → discover → back up → report, with per-collection
//!   failure isolation
//! - `storage`: `BackupStore` trait and the filesystem layout
//! - `events`: structured run events and their sinks

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod security;
pub mod storage;
pub mod validation;

// Re-export commonly used types
pub use client::{HttpTransport, RateLimitedApiClient, Transport, TransportResponse};
pub use config::{BackupConfig, EnvironmentConfig, RateLimitConfig, VaultConfig};
pub use error::{Result, VaultError};
pub use events::{BackupEvent, EventSink, MemoryEventSink, TracingEventSink};
pub use models::{
    AccessDescriptor, BackupMetadata, BackupResult, BackupStats, CollectionInfo,
    CollectionOutcome, FieldDescriptor, Page, Phase, SchemaDescriptor, ValueKind,
};
pub use orchestrator::{BackupOrchestrator, RunContext, RunState};
pub use storage::{BackupStore, FsBackupStore, LogLevel};
pub use validation::{ValidationError, validate_manifest};
