//! Shared fixtures for orchestrator integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cmsvault_core::config::{BackupConfig, EnvironmentConfig, RateLimitConfig, VaultConfig};
use cmsvault_core::models::{BackupMetadata, BackupStats, CollectionOutcome, SchemaDescriptor};
use cmsvault_core::security::ApiKey;
use cmsvault_core::storage::{BackupStore, FsBackupStore, LogLevel};
use cmsvault_core::{Transport, TransportResponse, VaultError};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use url::Url;

pub const ENVIRONMENT: &str = "staging";
pub const BASE_URL: &str = "https://cms.test/api";
pub const API_KEY: &str = "integration-key";

/// In-memory CMS answering the access, count and page endpoints.
#[derive(Default)]
pub struct FakeCms {
    collections: BTreeMap<String, Vec<Value>>,
    access_status: Option<u16>,
    failing_counts: HashSet<String>,
    failing_pages: HashMap<String, u64>,
    failing_samples: HashSet<String>,
    reported_counts: HashMap<String, u64>,
    requests: Mutex<Vec<Url>>,
}

impl FakeCms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection holding `count` generated documents
    pub fn collection(mut self, name: &str, count: u64) -> Self {
        let docs = (0..count)
            .map(|i| json!({ "id": format!("{name}-{i}"), "position": i, "title": null }))
            .collect();
        self.collections.insert(name.to_string(), docs);
        self
    }

    pub fn access_status(mut self, status: u16) -> Self {
        self.access_status = Some(status);
        self
    }

    pub fn failing_count(mut self, name: &str) -> Self {
        self.failing_counts.insert(name.to_string());
        self
    }

    pub fn failing_page(mut self, name: &str, page: u64) -> Self {
        self.failing_pages.insert(name.to_string(), page);
        self
    }

    pub fn failing_sample(mut self, name: &str) -> Self {
        self.failing_samples.insert(name.to_string());
        self
    }

    /// Makes the count endpoint report `count` regardless of the documents
    pub fn reported_count(mut self, name: &str, count: u64) -> Self {
        self.reported_counts.insert(name.to_string(), count);
        self
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|url| url.path().to_string())
            .collect()
    }

    fn query(url: &Url, key: &str) -> Option<u64> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.parse().ok())
    }

    fn respond(&self, url: &Url) -> TransportResponse {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.skip(1).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["access"] => match self.access_status {
                Some(status) => TransportResponse::new(status, "{}"),
                None => {
                    let collections: serde_json::Map<String, Value> = self
                        .collections
                        .keys()
                        .chain(self.failing_counts.iter())
                        .map(|name| (name.clone(), json!({ "read": { "permission": true } })))
                        .collect();
                    TransportResponse::json(&json!({
                        "canAccessAdmin": true,
                        "collections": collections,
                    }))
                }
            },
            [name, "count"] => {
                if self.failing_counts.contains(*name) {
                    return TransportResponse::new(500, "{}");
                }
                let total = self.reported_counts.get(*name).copied().unwrap_or_else(|| {
                    self.collections.get(*name).map_or(0, |docs| docs.len() as u64)
                });
                TransportResponse::json(&json!({ "totalDocs": total }))
            }
            [name] => {
                let page = Self::query(url, "page").unwrap_or(1);
                let limit = Self::query(url, "limit").unwrap_or(10);
                if limit == 1 && self.failing_samples.contains(*name) {
                    return TransportResponse::new(503, "{}");
                }
                if limit > 1 && self.failing_pages.get(*name) == Some(&page) {
                    return TransportResponse::new(502, "{}");
                }
                let Some(docs) = self.collections.get(*name) else {
                    return TransportResponse::new(404, "{}");
                };

                let total = docs.len() as u64;
                let start = ((page - 1) * limit).min(total) as usize;
                let end = (page * limit).min(total) as usize;
                let has_next = page * limit < total;
                TransportResponse::json(&json!({
                    "docs": &docs[start..end],
                    "totalDocs": total,
                    "hasNextPage": has_next,
                    "nextPage": if has_next { json!(page + 1) } else { Value::Null },
                    "page": page,
                    "limit": limit,
                }))
            }
            _ => TransportResponse::new(404, "{}"),
        }
    }
}

#[async_trait]
impl Transport for FakeCms {
    async fn get(&self, url: &Url, authorization: &str) -> cmsvault_core::Result<TransportResponse> {
        assert_eq!(authorization, format!("users API-Key {API_KEY}"));
        self.requests.lock().unwrap().push(url.clone());
        Ok(self.respond(url))
    }
}

pub fn environment() -> EnvironmentConfig {
    EnvironmentConfig::new(ENVIRONMENT, BASE_URL, ApiKey::new(API_KEY.to_string())).unwrap()
}

/// Configuration writing into `output_dir` with pages of `batch_size`
pub fn config(output_dir: &Path, batch_size: u32) -> VaultConfig {
    config_with(output_dir, batch_size, |backup| backup)
}

/// Like [`config`], with extra backup settings applied by `adjust`
pub fn config_with(
    output_dir: &Path,
    batch_size: u32,
    adjust: impl FnOnce(BackupConfig) -> BackupConfig,
) -> VaultConfig {
    VaultConfig::new(
        RateLimitConfig::new()
            .with_delay_ms(0)
            .with_batch_size(batch_size),
        adjust(BackupConfig::new().with_output_dir(output_dir)),
    )
    .with_environment(environment())
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Which store operation should fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    DataFor(String),
    Metadata,
}

/// Filesystem store with an injected failure.
pub struct FaultyStore {
    inner: FsBackupStore,
    fault: StoreFault,
}

impl FaultyStore {
    pub fn new(root: &Path, fault: StoreFault) -> Self {
        Self {
            inner: FsBackupStore::new(root),
            fault,
        }
    }
}

fn injected(context: &str) -> VaultError {
    VaultError::io(context, std::io::Error::other("disk full"))
}

#[async_trait]
impl BackupStore for FaultyStore {
    async fn create_structure(&self, environment: &str) -> cmsvault_core::Result<PathBuf> {
        self.inner.create_structure(environment).await
    }

    async fn save_data(
        &self,
        environment: &str,
        collection: &str,
        docs: &[Value],
    ) -> cmsvault_core::Result<PathBuf> {
        if self.fault == StoreFault::DataFor(collection.to_string()) {
            return Err(injected("Failed to write collection data"));
        }
        self.inner.save_data(environment, collection, docs).await
    }

    async fn save_schema(
        &self,
        environment: &str,
        collection: &str,
        schema: &SchemaDescriptor,
    ) -> cmsvault_core::Result<Option<PathBuf>> {
        self.inner.save_schema(environment, collection, schema).await
    }

    async fn save_metadata(
        &self,
        environment: &str,
        metadata: &BackupMetadata,
    ) -> cmsvault_core::Result<PathBuf> {
        if self.fault == StoreFault::Metadata {
            return Err(injected("Failed to write metadata"));
        }
        self.inner.save_metadata(environment, metadata).await
    }

    async fn append_log(
        &self,
        environment: &str,
        level: LogLevel,
        message: &str,
        extra: Option<&Value>,
    ) -> cmsvault_core::Result<()> {
        self.inner.append_log(environment, level, message, extra).await
    }

    async fn generate_summary(
        &self,
        environment: &str,
        collections: &[CollectionOutcome],
        stats: &BackupStats,
    ) -> cmsvault_core::Result<PathBuf> {
        self.inner.generate_summary(environment, collections, stats).await
    }

    fn backup_dir(&self, environment: &str) -> Option<PathBuf> {
        self.inner.backup_dir(environment)
    }
}
