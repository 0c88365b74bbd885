//! Backup pipeline orchestration.
//!
//! Drives one run per environment through
//! `INIT → VALIDATING → DISCOVERING → BACKING_UP → REPORTING → DONE`.
//!
//! # Failure isolation
//! - configuration and connection failures end the run (fatal)
//! - a collection failing discovery is excluded, the others continue
//! - a collection failing backup is counted as failed, the others continue
//! - anything else escaping the pipeline is recorded as a `general` error
//!
//! Every failure is recorded as data in [`BackupStats::errors`]; the run
//! always yields a [`BackupResult`].

mod state;

pub use state::RunState;

use crate::client::{RateLimitedApiClient, Transport};
use crate::config::{EnvironmentConfig, VaultConfig};
use crate::error::VaultError;
use crate::events::{BackupEvent, EventSink, TracingEventSink};
use crate::models::{
    AccessDescriptor, BackupMetadata, BackupResult, BackupStats, CollectionInfo,
    CollectionOutcome, ManifestCollection, Phase, SchemaDescriptor,
};
use crate::storage::{BackupStore, FsBackupStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mutable record of one run, owned by the orchestrator while it executes.
pub struct RunContext {
    environment: String,
    state: RunState,
    stats: BackupStats,
    collections: Vec<CollectionOutcome>,
    backup_path: Option<PathBuf>,
    store: Arc<dyn BackupStore>,
    pending_log: Vec<BackupEvent>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("environment", &self.environment)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .field("collections", &self.collections)
            .field("backup_path", &self.backup_path)
            .finish_non_exhaustive()
    }
}

impl RunContext {
    /// Starts a run record writing through `store`
    pub fn new(environment: impl Into<String>, store: Arc<dyn BackupStore>) -> Self {
        Self {
            environment: environment.into(),
            state: RunState::Init,
            stats: BackupStats::new(),
            collections: Vec::new(),
            backup_path: None,
            store,
            pending_log: Vec::new(),
        }
    }

    /// Environment name
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Current pipeline state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Statistics gathered so far
    pub fn stats(&self) -> &BackupStats {
        &self.stats
    }

    /// Per-collection outcomes gathered so far
    pub fn collections(&self) -> &[CollectionOutcome] {
        &self.collections
    }

    /// Run directory, once the structure has been created
    pub fn backup_path(&self) -> Option<&PathBuf> {
        self.backup_path.as_ref()
    }

    /// Attaches the run directory; buffered log events are flushed on the
    /// next emitted event.
    pub fn set_backup_path(&mut self, path: PathBuf) {
        self.backup_path = Some(path);
    }

    /// Final result; `success` is derived from the statistics
    pub fn into_result(self) -> BackupResult {
        BackupResult::from_run(
            self.environment,
            self.backup_path,
            self.stats,
            self.collections,
        )
    }
}

/// Runs backups for the environments of a [`VaultConfig`].
///
/// # Example
/// ```rust,no_run
/// use cmsvault_core::config::VaultConfig;
/// use cmsvault_core::orchestrator::BackupOrchestrator;
///
/// # async fn example(config: VaultConfig) {
/// let orchestrator = BackupOrchestrator::new(config);
/// let result = orchestrator.perform_backup("staging").await;
/// println!("success: {}, records: {}", result.success, result.statistics.total_records);
/// # }
/// ```
pub struct BackupOrchestrator {
    config: VaultConfig,
    store: Option<Arc<dyn BackupStore>>,
    transport: Option<Arc<dyn Transport>>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl std::fmt::Debug for BackupOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupOrchestrator")
            .field("environments", &self.config.environment_names())
            .field("rate_limit", &self.config.rate_limit)
            .field("backup", &self.config.backup)
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}

impl BackupOrchestrator {
    /// Creates an orchestrator writing to the filesystem and logging via
    /// `tracing`
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            sinks: vec![Arc::new(TracingEventSink)],
        }
    }

    /// Builder method to use a custom store instead of the filesystem.
    pub fn with_store(mut self, store: Arc<dyn BackupStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builder method to use a custom transport for all clients.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builder method to add an event sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Configuration this orchestrator runs with
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Builds the API client for an environment.
    ///
    /// # Errors
    /// Returns error if the HTTP transport cannot be created
    pub fn build_client(&self, environment: &EnvironmentConfig) -> crate::Result<RateLimitedApiClient> {
        let client = match &self.transport {
            Some(transport) => RateLimitedApiClient::with_transport(
                environment.clone(),
                self.config.rate_limit,
                Arc::clone(transport),
            ),
            None => RateLimitedApiClient::new(environment.clone(), self.config.rate_limit)?,
        };
        Ok(client
            .with_depth(self.config.backup.depth)
            .with_sort(self.config.backup.sort.clone()))
    }

    fn store_for(&self, environment: Option<&EnvironmentConfig>) -> Arc<dyn BackupStore> {
        if let Some(store) = &self.store {
            return Arc::clone(store);
        }
        let mut store = FsBackupStore::new(&self.config.backup.output_dir)
            .with_compression(self.config.backup.compress);
        if let Some(environment) = environment {
            store = store.with_credential_check(environment.api_key.clone());
        }
        Arc::new(store)
    }

    async fn emit(&self, run: &mut RunContext, event: BackupEvent) {
        for sink in &self.sinks {
            sink.emit(&event);
        }
        run.pending_log.push(event);

        if run.backup_path.is_none() {
            return;
        }
        for pending in std::mem::take(&mut run.pending_log) {
            let extra = serde_json::to_value(&pending).ok();
            if let Err(e) = run
                .store
                .append_log(&run.environment, pending.level(), &pending.message(), extra.as_ref())
                .await
            {
                warn!(environment = %run.environment, error = %e, "Failed to write backup log entry");
            }
        }
    }

    async fn enter(&self, run: &mut RunContext, state: RunState) {
        if !run.state.can_transition_to(state) {
            warn!(from = %run.state, to = %state, "Unexpected run state transition");
        }
        run.state = state;
        let event = BackupEvent::StateChanged {
            environment: run.environment.clone(),
            state,
        };
        self.emit(run, event).await;
    }

    async fn abort(&self, run: &mut RunContext, phase: Phase, error: String) {
        run.stats.record_error(None, phase, error.clone());
        let event = BackupEvent::RunAborted {
            environment: run.environment.clone(),
            phase,
            error,
        };
        self.emit(run, event).await;
        self.enter(run, RunState::Done).await;
        run.backup_path = None;
    }

    /// Checks that the API is reachable and accepts the credential.
    ///
    /// Any failure yields `false`; the reason is logged.
    pub async fn validate_connection(&self, client: &RateLimitedApiClient) -> bool {
        match self.check_connection(client).await {
            Ok(_) => true,
            Err(e) => {
                warn!(environment = %client.environment().name, error = %e, "Connection validation failed");
                false
            }
        }
    }

    async fn check_connection(&self, client: &RateLimitedApiClient) -> crate::Result<AccessDescriptor> {
        client.get_access().await.map_err(|e| {
            VaultError::connection_failed(client.environment().redacted_url(), e.to_string())
        })
    }

    /// Resolves an environment and fetches its access snapshot.
    ///
    /// # Errors
    /// Returns error if the environment is unknown or the API is unreachable
    pub async fn test_connection(&self, environment: &str) -> crate::Result<AccessDescriptor> {
        let environment = self.config.environment(environment)?;
        let client = self.build_client(environment)?;
        self.check_connection(&client).await
    }

    /// Counts and samples each named collection.
    ///
    /// A collection whose count request fails is recorded as a `discovery`
    /// error and left out of the returned list. A failed schema sample only
    /// produces a warning; the collection is kept.
    pub async fn discover_collections(
        &self,
        client: &RateLimitedApiClient,
        names: &[String],
        run: &mut RunContext,
    ) -> Vec<CollectionInfo> {
        let mut infos = Vec::with_capacity(names.len());

        for name in names {
            let count = match client.get_collection_count(name).await {
                Ok(count) => count,
                Err(e) => {
                    let error = VaultError::discovery_failed(name, e.to_string()).to_string();
                    run.stats.record_error(Some(name), Phase::Discovery, error.clone());
                    let event = BackupEvent::DiscoveryFailed {
                        environment: run.environment.clone(),
                        collection: name.clone(),
                        error,
                    };
                    self.emit(run, event).await;
                    continue;
                }
            };

            let schema = if count == 0 {
                SchemaDescriptor::empty(name)
            } else {
                client.get_collection_schema(name).await
            };

            if let Some(error) = &schema.error {
                run.stats
                    .add_warning(format!("Schema sample for '{}' failed: {}", name, error));
                let event = BackupEvent::SchemaProbeFailed {
                    environment: run.environment.clone(),
                    collection: name.clone(),
                    error: error.clone(),
                };
                self.emit(run, event).await;
            }

            debug!(collection = %name, count, fields = schema.fields.len(), "Discovered collection");
            infos.push(CollectionInfo::new(name.clone(), count, schema));
        }

        infos
    }

    /// Retrieves and persists one collection.
    ///
    /// Empty collections are skipped; only `skipped_collections` moves. Returns
    /// `false` when the collection failed; the failure is recorded as a
    /// `backup` error and the run continues.
    pub async fn backup_collection(
        &self,
        client: &RateLimitedApiClient,
        info: &CollectionInfo,
        run: &mut RunContext,
    ) -> bool {
        if !info.has_data {
            run.stats.skipped_collections = run.stats.skipped_collections.saturating_add(1);
            run.collections.push(CollectionOutcome {
                name: info.name.clone(),
                record_count: 0,
                retrieved_count: None,
                backup_success: true,
                skipped: true,
                data_file: None,
            });
            let event = BackupEvent::CollectionSkipped {
                environment: run.environment.clone(),
                collection: info.name.clone(),
                reason: "no documents".to_string(),
            };
            self.emit(run, event).await;
            return true;
        }

        let event = BackupEvent::CollectionStarted {
            environment: run.environment.clone(),
            collection: info.name.clone(),
            expected: info.count,
        };
        self.emit(run, event).await;

        match self.retrieve_and_persist(client, info, run).await {
            Ok((retrieved, path)) => {
                run.stats.total_records = run.stats.total_records.saturating_add(retrieved);
                run.stats.successful_collections = run.stats.successful_collections.saturating_add(1);
                run.collections.push(CollectionOutcome {
                    name: info.name.clone(),
                    record_count: info.count,
                    retrieved_count: Some(retrieved),
                    backup_success: true,
                    skipped: false,
                    data_file: path
                        .file_name()
                        .map(|file| file.to_string_lossy().into_owned()),
                });
                let event = BackupEvent::CollectionBackedUp {
                    environment: run.environment.clone(),
                    collection: info.name.clone(),
                    records: retrieved,
                    path,
                };
                self.emit(run, event).await;
                true
            }
            Err(e) => {
                let error = e.to_string();
                run.stats
                    .record_error(Some(&info.name), Phase::Backup, error.clone());
                run.stats.failed_collections = run.stats.failed_collections.saturating_add(1);
                run.collections.push(CollectionOutcome {
                    name: info.name.clone(),
                    record_count: info.count,
                    retrieved_count: None,
                    backup_success: false,
                    skipped: false,
                    data_file: None,
                });
                let event = BackupEvent::CollectionFailed {
                    environment: run.environment.clone(),
                    collection: info.name.clone(),
                    error,
                };
                self.emit(run, event).await;
                false
            }
        }
    }

    async fn retrieve_and_persist(
        &self,
        client: &RateLimitedApiClient,
        info: &CollectionInfo,
        run: &mut RunContext,
    ) -> crate::Result<(u64, PathBuf)> {
        let name = info.name.as_str();
        let data = client.fetch_all_pages(name).await;
        let retrieved = data.docs.len() as u64;

        if let Some(truncation) = &data.truncation {
            if self.config.backup.strict_pagination || data.pages_fetched == 0 {
                return Err(VaultError::backup_failed(
                    name,
                    format!("pagination stopped: {}", truncation),
                ));
            }

            run.stats.add_warning(format!(
                "Collection '{}' is incomplete: {} ({} of {} documents retrieved)",
                name, truncation, retrieved, info.count
            ));
            let event = BackupEvent::PaginationTruncated {
                environment: run.environment.clone(),
                collection: name.to_string(),
                failed_page: truncation.failed_page,
                retrieved,
                error: truncation.error.clone(),
            };
            self.emit(run, event).await;
        } else if retrieved != info.count {
            run.stats.add_warning(format!(
                "Collection '{}' changed during backup: {} documents at discovery, {} retrieved",
                name, info.count, retrieved
            ));
        }

        let environment = run.environment.clone();
        let path = run
            .store
            .save_data(&environment, name, &data.docs)
            .await
            .map_err(|e| VaultError::backup_failed(name, e.to_string()))?;
        run.store
            .save_schema(&environment, name, &info.schema)
            .await
            .map_err(|e| VaultError::backup_failed(name, e.to_string()))?;

        Ok((retrieved, path))
    }

    /// Runs the full pipeline for one environment.
    ///
    /// Never fails: every error ends up in the returned statistics, and
    /// `success` is true only when no collection failed and no error was
    /// recorded.
    pub async fn perform_backup(&self, environment: &str) -> BackupResult {
        let resolved = self.config.environment(environment).cloned();
        let store = self.store_for(resolved.as_ref().ok());
        let name = resolved
            .as_ref()
            .map(|env| env.name.clone())
            .unwrap_or_else(|_| environment.to_string());
        let mut run = RunContext::new(name, store);

        let client = match resolved.and_then(|env| self.build_client(&env)) {
            Ok(client) => client,
            Err(e) => {
                self.abort(&mut run, Phase::Configuration, e.to_string()).await;
                run.stats.finish();
                return run.into_result();
            }
        };

        let mut metadata = BackupMetadata::new(
            run.environment.clone(),
            client.environment().redacted_url(),
            self.config.rate_limit.to_manifest(),
        );
        let event = BackupEvent::RunStarted {
            environment: run.environment.clone(),
            run_id: metadata.run_id,
        };
        self.emit(&mut run, event).await;

        self.enter(&mut run, RunState::Validating).await;
        let access = match self.check_connection(&client).await {
            Ok(access) => access,
            Err(e) => {
                let error = e.to_string();
                let event = BackupEvent::ConnectionFailed {
                    environment: run.environment.clone(),
                    error: error.clone(),
                };
                self.emit(&mut run, event).await;
                self.abort(&mut run, Phase::Connection, error).await;
                run.stats.finish();
                return run.into_result();
            }
        };
        let event = BackupEvent::ConnectionValidated {
            environment: run.environment.clone(),
            collections: access.collections.len(),
        };
        self.emit(&mut run, event).await;

        metadata.can_access_admin = access.can_access_admin;
        metadata.depth = self.config.backup.depth;

        if let Err(e) = self.run_pipeline(&client, &access, &mut metadata, &mut run).await {
            self.abort(&mut run, Phase::General, e.to_string()).await;
        }

        if run.stats.end_time.is_none() {
            run.stats.finish();
        }
        run.into_result()
    }

    async fn run_pipeline(
        &self,
        client: &RateLimitedApiClient,
        access: &AccessDescriptor,
        metadata: &mut BackupMetadata,
        run: &mut RunContext,
    ) -> crate::Result<()> {
        self.enter(run, RunState::Discovering).await;

        let names = access.collection_names();
        if names.is_empty() {
            warn!(environment = %run.environment, "No collections visible to this API key");
        }
        let (kept, filtered) = self.config.backup.collection_filter().partition(names);
        run.stats.filtered_collections = filtered.len();

        let infos = self.discover_collections(client, &kept, run).await;
        run.stats.total_collections = infos.len();
        let event = BackupEvent::CollectionsDiscovered {
            environment: run.environment.clone(),
            discovered: infos.len(),
            filtered: filtered.len(),
            failed: run.stats.errors_in(Phase::Discovery),
        };
        self.emit(run, event).await;

        let run_dir = run.store.create_structure(&run.environment).await?;
        run.set_backup_path(run_dir);

        metadata.collections = infos.iter().map(ManifestCollection::from).collect();
        metadata.filtered_collections = filtered;
        run.store.save_metadata(&run.environment, metadata).await?;

        self.enter(run, RunState::BackingUp).await;
        for info in &infos {
            self.backup_collection(client, info, run).await;
        }

        self.enter(run, RunState::Reporting).await;
        run.stats.finish();
        run.store
            .generate_summary(&run.environment, &run.collections, &run.stats)
            .await?;

        let event = BackupEvent::RunFinished {
            environment: run.environment.clone(),
            success: run.stats.is_successful(),
            total_records: run.stats.total_records,
            failed_collections: run.stats.failed_collections,
            duration_ms: run.stats.duration_ms(),
        };
        self.emit(run, event).await;
        self.enter(run, RunState::Done).await;

        Ok(())
    }

    /// Runs backups for several environments one after another.
    pub async fn perform_backups(&self, environments: &[String]) -> Vec<BackupResult> {
        let mut results = Vec::with_capacity(environments.len());
        for environment in environments {
            results.push(self.perform_backup(environment).await);
        }
        results
    }
}
