//! Filesystem implementation of [`BackupStore`].

use super::{BackupStore, LogLevel};
use crate::error::VaultError;
use crate::models::{BackupMetadata, BackupStats, CollectionOutcome, SchemaDescriptor};
use crate::security::ApiKey;
use crate::validation::{check_no_credentials, validate_manifest};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

const DATA_DIR: &str = "data";
const SCHEMAS_DIR: &str = "schemas";
const METADATA_FILE: &str = "metadata.json";
const LOG_FILE: &str = "backup.log";
const SUMMARY_FILE: &str = "summary.json";

/// Run directory name format (filesystem-safe ISO-8601)
const RUN_DIR_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3fZ";

/// Stores each run under `<root>/<env>/<timestamp>/`.
///
/// Collection slugs are sanitized into file stems. Within one run each
/// collection keeps a unique stem; a collision with an earlier collection
/// (including one differing only by case) gets a `-N` suffix.
///
/// # Example
/// ```rust,no_run
/// use cmsvault_core::storage::{BackupStore, FsBackupStore};
///
/// # async fn example() -> cmsvault_core::Result<()> {
/// let store = FsBackupStore::new("./backups");
/// let run_dir = store.create_structure("staging").await?;
/// store.save_data("staging", "users", &[serde_json::json!({"id": 1})]).await?;
/// assert_eq!(store.backup_dir("staging"), Some(run_dir));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FsBackupStore {
    root: PathBuf,
    compress: bool,
    api_key: Option<ApiKey>,
    runs: Mutex<HashMap<String, RunFiles>>,
}

/// Run directory plus the file stems handed out in it
#[derive(Debug)]
struct RunFiles {
    dir: PathBuf,
    stems: HashMap<String, String>,
    taken: HashSet<String>,
}

impl RunFiles {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            stems: HashMap::new(),
            taken: HashSet::new(),
        }
    }

    fn stem_for(&mut self, collection: &str) -> String {
        if let Some(stem) = self.stems.get(collection) {
            return stem.clone();
        }

        let base = sanitize_file_name(collection);
        let mut stem = base.clone();
        let mut attempt: u32 = 0;
        while self.taken.contains(&stem.to_ascii_lowercase()) {
            attempt = attempt.saturating_add(1);
            stem = format!("{}-{}", base, attempt);
        }

        self.taken.insert(stem.to_ascii_lowercase());
        self.stems.insert(collection.to_string(), stem.clone());
        stem
    }
}

impl FsBackupStore {
    /// Creates a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compress: false,
            api_key: None,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Builder method to write data files zstd-compressed.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Builder method to reject manifests and summaries containing `api_key`.
    pub fn with_credential_check(mut self, api_key: ApiKey) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Root directory of all runs
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, environment: &str) -> crate::Result<PathBuf> {
        self.backup_dir(environment).ok_or_else(|| not_created(environment))
    }

    /// Run directory and the collection's file stem within it.
    fn collection_target(
        &self,
        environment: &str,
        collection: &str,
    ) -> crate::Result<(PathBuf, String)> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| VaultError::configuration("backup run registry is poisoned"))?;
        let files = runs.get_mut(environment).ok_or_else(|| not_created(environment))?;
        Ok((files.dir.clone(), files.stem_for(collection)))
    }

    fn data_file_name(&self, stem: &str) -> String {
        if self.compress {
            format!("{}.json.zst", stem)
        } else {
            format!("{}.json", stem)
        }
    }
}

fn not_created(environment: &str) -> VaultError {
    VaultError::configuration(format!(
        "backup structure has not been created for environment '{}'",
        environment
    ))
}

/// Makes a collection slug safe to use as a file name.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; everything else becomes
/// `_`. A leading dot is replaced so the result is never hidden or `..`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.starts_with('.') {
        sanitized.replace_range(..1, "_");
    }
    if sanitized.is_empty() {
        sanitized.push('_');
    }
    sanitized
}

async fn write_file(path: &Path, bytes: &[u8]) -> crate::Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| VaultError::io(format!("Failed to write to {}", path.display()), e))
}

async fn create_dir(path: &Path) -> crate::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| VaultError::io(format!("Failed to create directory {}", path.display()), e))
}

fn to_pretty_json<T: serde::Serialize + ?Sized>(value: &T, context: &str) -> crate::Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| VaultError::serialization(context, e))
}

#[cfg(feature = "compression")]
fn compress(bytes: &[u8]) -> crate::Result<Vec<u8>> {
    zstd::encode_all(bytes, 3).map_err(|e| VaultError::io("Compression failed", e))
}

#[cfg(not(feature = "compression"))]
fn compress(_bytes: &[u8]) -> crate::Result<Vec<u8>> {
    Err(VaultError::configuration(
        "Compression not available. Compile with --features compression",
    ))
}

#[async_trait]
impl BackupStore for FsBackupStore {
    async fn create_structure(&self, environment: &str) -> crate::Result<PathBuf> {
        let env_dir = self.root.join(sanitize_file_name(environment));
        create_dir(&env_dir).await?;

        let stamp = Utc::now().format(RUN_DIR_FORMAT).to_string();
        let mut run_dir = env_dir.join(&stamp);
        let mut attempt: u32 = 0;
        loop {
            match tokio::fs::create_dir(&run_dir).await {
                Ok(()) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt = attempt.saturating_add(1);
                    run_dir = env_dir.join(format!("{}-{}", stamp, attempt));
                }
                Err(e) => {
                    return Err(VaultError::io(
                        format!("Failed to create directory {}", run_dir.display()),
                        e,
                    ));
                }
            }
        }

        create_dir(&run_dir.join(DATA_DIR)).await?;
        create_dir(&run_dir.join(SCHEMAS_DIR)).await?;

        if let Ok(mut runs) = self.runs.lock() {
            runs.insert(environment.to_string(), RunFiles::new(run_dir.clone()));
        }
        tracing::info!(environment = %environment, path = %run_dir.display(), "Created backup structure");
        Ok(run_dir)
    }

    async fn save_data(
        &self,
        environment: &str,
        collection: &str,
        docs: &[Value],
    ) -> crate::Result<PathBuf> {
        let (run_dir, stem) = self.collection_target(environment, collection)?;
        let path = run_dir.join(DATA_DIR).join(self.data_file_name(&stem));

        let mut bytes = to_pretty_json(docs, "collection data")?;
        if self.compress {
            bytes = compress(&bytes)?;
        }
        write_file(&path, &bytes).await?;

        tracing::debug!(collection = %collection, docs = docs.len(), path = %path.display(), "Saved collection data");
        Ok(path)
    }

    async fn save_schema(
        &self,
        environment: &str,
        collection: &str,
        schema: &SchemaDescriptor,
    ) -> crate::Result<Option<PathBuf>> {
        if schema.fields.is_empty() && schema.sample_doc.is_none() && !schema.has_error() {
            return Ok(None);
        }

        let (run_dir, stem) = self.collection_target(environment, collection)?;
        let path = run_dir.join(SCHEMAS_DIR).join(format!("{}.schema.json", stem));
        write_file(&path, &to_pretty_json(schema, "schema descriptor")?).await?;
        Ok(Some(path))
    }

    async fn save_metadata(
        &self,
        environment: &str,
        metadata: &BackupMetadata,
    ) -> crate::Result<PathBuf> {
        let path = self.run_dir(environment)?.join(METADATA_FILE);

        let value = serde_json::to_value(metadata)
            .map_err(|e| VaultError::serialization("backup metadata", e))?;
        validate_manifest(&value, self.api_key.as_ref())?;
        tracing::debug!("Manifest validation passed");

        write_file(&path, &to_pretty_json(&value, "backup metadata")?).await?;
        Ok(path)
    }

    async fn append_log(
        &self,
        environment: &str,
        level: LogLevel,
        message: &str,
        extra: Option<&Value>,
    ) -> crate::Result<()> {
        let path = self.run_dir(environment)?.join(LOG_FILE);

        let mut entry = json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "message": message,
        });
        if let (Some(Value::Object(fields)), Value::Object(target)) = (extra, &mut entry) {
            for (key, value) in fields {
                target.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| VaultError::serialization("log entry", e))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| VaultError::io(format!("Failed to open {}", path.display()), e))?;
        file.write_all(&line)
            .await
            .map_err(|e| VaultError::io(format!("Failed to append to {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| VaultError::io(format!("Failed to flush {}", path.display()), e))?;
        Ok(())
    }

    async fn generate_summary(
        &self,
        environment: &str,
        collections: &[CollectionOutcome],
        stats: &BackupStats,
    ) -> crate::Result<PathBuf> {
        let path = self.run_dir(environment)?.join(SUMMARY_FILE);

        let summary = json!({
            "environment": environment,
            "generated_at": Utc::now().to_rfc3339(),
            "success": stats.is_successful(),
            "duration_ms": stats.duration_ms(),
            "statistics": stats,
            "collections": collections,
        });
        check_no_credentials(&summary, self.api_key.as_ref())?;

        write_file(&path, &to_pretty_json(&summary, "backup summary")?).await?;
        Ok(path)
    }

    fn backup_dir(&self, environment: &str) -> Option<PathBuf> {
        self.runs
            .lock()
            .ok()
            .and_then(|runs| runs.get(environment).map(|files| files.dir.clone()))
    }
}
