//! Structured run events and their sinks.
//!
//! The orchestrator reports progress as [`BackupEvent`] values. Sinks decide
//! how to present them: [`TracingEventSink`] turns them into log records,
//! [`MemoryEventSink`] keeps them for inspection. The orchestrator also
//! mirrors every event into the run's `backup.log`.

use crate::models::Phase;
use crate::orchestrator::RunState;
use crate::storage::LogLevel;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;

/// Something that happened during a backup run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BackupEvent {
    RunStarted {
        environment: String,
        run_id: uuid::Uuid,
    },
    StateChanged {
        environment: String,
        state: RunState,
    },
    ConnectionValidated {
        environment: String,
        collections: usize,
    },
    ConnectionFailed {
        environment: String,
        error: String,
    },
    CollectionsDiscovered {
        environment: String,
        discovered: usize,
        filtered: usize,
        failed: usize,
    },
    DiscoveryFailed {
        environment: String,
        collection: String,
        error: String,
    },
    SchemaProbeFailed {
        environment: String,
        collection: String,
        error: String,
    },
    CollectionSkipped {
        environment: String,
        collection: String,
        reason: String,
    },
    CollectionStarted {
        environment: String,
        collection: String,
        expected: u64,
    },
    PaginationTruncated {
        environment: String,
        collection: String,
        failed_page: u64,
        retrieved: u64,
        error: String,
    },
    CollectionBackedUp {
        environment: String,
        collection: String,
        records: u64,
        path: PathBuf,
    },
    CollectionFailed {
        environment: String,
        collection: String,
        error: String,
    },
    RunFinished {
        environment: String,
        success: bool,
        total_records: u64,
        failed_collections: usize,
        duration_ms: u64,
    },
    RunAborted {
        environment: String,
        phase: Phase,
        error: String,
    },
}

impl BackupEvent {
    /// Stable snake_case name of the event
    pub fn name(&self) -> &'static str {
        match self {
            BackupEvent::RunStarted { .. } => "run_started",
            BackupEvent::StateChanged { .. } => "state_changed",
            BackupEvent::ConnectionValidated { .. } => "connection_validated",
            BackupEvent::ConnectionFailed { .. } => "connection_failed",
            BackupEvent::CollectionsDiscovered { .. } => "collections_discovered",
            BackupEvent::DiscoveryFailed { .. } => "discovery_failed",
            BackupEvent::SchemaProbeFailed { .. } => "schema_probe_failed",
            BackupEvent::CollectionSkipped { .. } => "collection_skipped",
            BackupEvent::CollectionStarted { .. } => "collection_started",
            BackupEvent::PaginationTruncated { .. } => "pagination_truncated",
            BackupEvent::CollectionBackedUp { .. } => "collection_backed_up",
            BackupEvent::CollectionFailed { .. } => "collection_failed",
            BackupEvent::RunFinished { .. } => "run_finished",
            BackupEvent::RunAborted { .. } => "run_aborted",
        }
    }

    /// Environment the event belongs to
    pub fn environment(&self) -> &str {
        match self {
            BackupEvent::RunStarted { environment, .. }
            | BackupEvent::StateChanged { environment, .. }
            | BackupEvent::ConnectionValidated { environment, .. }
            | BackupEvent::ConnectionFailed { environment, .. }
            | BackupEvent::CollectionsDiscovered { environment, .. }
            | BackupEvent::DiscoveryFailed { environment, .. }
            | BackupEvent::SchemaProbeFailed { environment, .. }
            | BackupEvent::CollectionSkipped { environment, .. }
            | BackupEvent::CollectionStarted { environment, .. }
            | BackupEvent::PaginationTruncated { environment, .. }
            | BackupEvent::CollectionBackedUp { environment, .. }
            | BackupEvent::CollectionFailed { environment, .. }
            | BackupEvent::RunFinished { environment, .. }
            | BackupEvent::RunAborted { environment, .. } => environment,
        }
    }

    /// Collection the event is about, if any
    pub fn collection(&self) -> Option<&str> {
        match self {
            BackupEvent::DiscoveryFailed { collection, .. }
            | BackupEvent::SchemaProbeFailed { collection, .. }
            | BackupEvent::CollectionSkipped { collection, .. }
            | BackupEvent::CollectionStarted { collection, .. }
            | BackupEvent::PaginationTruncated { collection, .. }
            | BackupEvent::CollectionBackedUp { collection, .. }
            | BackupEvent::CollectionFailed { collection, .. } => Some(collection),
            _ => None,
        }
    }

    /// Severity used for logging
    pub fn level(&self) -> LogLevel {
        match self {
            BackupEvent::StateChanged { .. } => LogLevel::Debug,
            BackupEvent::ConnectionFailed { .. }
            | BackupEvent::DiscoveryFailed { .. }
            | BackupEvent::CollectionFailed { .. }
            | BackupEvent::RunAborted { .. } => LogLevel::Error,
            BackupEvent::SchemaProbeFailed { .. } | BackupEvent::PaginationTruncated { .. } => {
                LogLevel::Warn
            }
            BackupEvent::RunFinished { success: false, .. } => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }

    /// Human-readable one-line description
    pub fn message(&self) -> String {
        match self {
            BackupEvent::RunStarted { environment, run_id } => {
                format!("Starting backup of '{}' (run {})", environment, run_id)
            }
            BackupEvent::StateChanged { state, .. } => format!("Entering state {}", state),
            BackupEvent::ConnectionValidated { collections, .. } => {
                format!("Connection validated, {} collections visible", collections)
            }
            BackupEvent::ConnectionFailed { error, .. } => {
                format!("Connection validation failed: {}", error)
            }
            BackupEvent::CollectionsDiscovered {
                discovered,
                filtered,
                failed,
                ..
            } => format!(
                "Discovered {} collections ({} excluded, {} failed)",
                discovered, filtered, failed
            ),
            BackupEvent::DiscoveryFailed { collection, error, .. } => {
                format!("Discovery failed for '{}': {}", collection, error)
            }
            BackupEvent::SchemaProbeFailed { collection, error, .. } => {
                format!("Schema sample failed for '{}': {}", collection, error)
            }
            BackupEvent::CollectionSkipped { collection, reason, .. } => {
                format!("Skipping '{}': {}", collection, reason)
            }
            BackupEvent::CollectionStarted { collection, expected, .. } => {
                format!("Backing up '{}' ({} documents)", collection, expected)
            }
            BackupEvent::PaginationTruncated {
                collection,
                failed_page,
                retrieved,
                error,
                ..
            } => format!(
                "Pagination of '{}' stopped at page {} after {} documents: {}",
                collection, failed_page, retrieved, error
            ),
            BackupEvent::CollectionBackedUp { collection, records, .. } => {
                format!("Backed up '{}' ({} documents)", collection, records)
            }
            BackupEvent::CollectionFailed { collection, error, .. } => {
                format!("Backup of '{}' failed: {}", collection, error)
            }
            BackupEvent::RunFinished {
                success,
                total_records,
                failed_collections,
                duration_ms,
                ..
            } => format!(
                "Backup {} in {}ms: {} documents, {} failed collections",
                if *success { "completed" } else { "completed with errors" },
                duration_ms,
                total_records,
                failed_collections
            ),
            BackupEvent::RunAborted { phase, error, .. } => {
                format!("Backup aborted during {}: {}", phase, error)
            }
        }
    }
}

/// Receives run events.
pub trait EventSink: Send + Sync {
    /// Handles one event
    fn emit(&self, event: &BackupEvent);
}

/// Forwards events to `tracing` with structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &BackupEvent) {
        let name = event.name();
        let environment = event.environment();
        let collection = event.collection().unwrap_or("-");
        let message = event.message();

        match event.level() {
            LogLevel::Debug => {
                tracing::debug!(event = name, environment, collection, "{}", message);
            }
            LogLevel::Info => {
                tracing::info!(event = name, environment, collection, "{}", message);
            }
            LogLevel::Warn => {
                tracing::warn!(event = name, environment, collection, "{}", message);
            }
            LogLevel::Error => {
                tracing::error!(event = name, environment, collection, "{}", message);
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<BackupEvent>>,
}

impl MemoryEventSink {
    /// Creates an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events
    pub fn events(&self) -> Vec<BackupEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Names of the collected events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(BackupEvent::name).collect()
    }

    /// Number of collected events named `name`
    pub fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &BackupEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> BackupEvent {
        BackupEvent::CollectionFailed {
            environment: "prod".to_string(),
            collection: "media".to_string(),
            error: "HTTP status 500".to_string(),
        }
    }

    #[test]
    fn test_event_accessors() {
        let event = failed();
        assert_eq!(event.name(), "collection_failed");
        assert_eq!(event.environment(), "prod");
        assert_eq!(event.collection(), Some("media"));
        assert_eq!(event.level(), LogLevel::Error);
        assert!(event.message().contains("media"));
    }

    #[test]
    fn test_event_serialization() {
        let value = serde_json::to_value(failed()).unwrap();
        assert_eq!(value["event"], "collection_failed");
        assert_eq!(value["collection"], "media");

        let state = BackupEvent::StateChanged {
            environment: "prod".to_string(),
            state: RunState::BackingUp,
        };
        assert_eq!(serde_json::to_value(&state).unwrap()["state"], "backing_up");
        assert_eq!(state.level(), LogLevel::Debug);
        assert_eq!(state.collection(), None);
    }

    #[test]
    fn test_run_finished_level() {
        let finished = |success: bool| BackupEvent::RunFinished {
            environment: "prod".to_string(),
            success,
            total_records: 2,
            failed_collections: usize::from(!success),
            duration_ms: 10,
        };
        assert_eq!(finished(true).level(), LogLevel::Info);
        assert_eq!(finished(false).level(), LogLevel::Warn);
        assert!(finished(false).message().contains("with errors"));
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemoryEventSink::new();
        sink.emit(&failed());
        sink.emit(&BackupEvent::RunAborted {
            environment: "prod".to_string(),
            phase: Phase::Connection,
            error: "HTTP status 401".to_string(),
        });

        assert_eq!(sink.names(), vec!["collection_failed", "run_aborted"]);
        assert_eq!(sink.count("run_aborted"), 1);
        assert_eq!(sink.count("run_started"), 0);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        TracingEventSink.emit(&failed());
    }
}
