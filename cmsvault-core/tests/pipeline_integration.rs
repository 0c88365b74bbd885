//! End-to-end backup runs against an in-memory CMS.
//!
//! Each test drives `BackupOrchestrator::perform_backup` with a fake
//! transport and a filesystem store rooted in a temporary directory, then
//! checks the returned statistics and the artifacts left on disk.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::uninlined_format_args)]

mod common;

use cmsvault_core::events::MemoryEventSink;
use cmsvault_core::models::{BackupResult, Phase};
use cmsvault_core::orchestrator::BackupOrchestrator;
use cmsvault_core::storage::BackupStore;
use common::{API_KEY, ENVIRONMENT, FakeCms, FaultyStore, StoreFault, config, config_with, read_json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct Harness {
    cms: Arc<FakeCms>,
    sink: Arc<MemoryEventSink>,
    orchestrator: BackupOrchestrator,
}

fn harness(cms: FakeCms, config: cmsvault_core::VaultConfig) -> Harness {
    let cms = Arc::new(cms);
    let sink = Arc::new(MemoryEventSink::new());
    let orchestrator = BackupOrchestrator::new(config)
        .with_transport(cms.clone())
        .with_event_sink(sink.clone());
    Harness { cms, sink, orchestrator }
}

fn run_dir(result: &BackupResult) -> PathBuf {
    result.backup_path.clone().expect("run directory")
}

fn data_file(result: &BackupResult, collection: &str) -> PathBuf {
    run_dir(result).join("data").join(format!("{}.json", collection))
}

fn docs_in(path: &Path) -> usize {
    read_json(path).as_array().map(Vec::len).unwrap()
}

fn assert_success_invariant(result: &BackupResult) {
    let stats = &result.statistics;
    assert_eq!(
        result.success,
        stats.failed_collections == 0 && stats.errors.is_empty(),
        "success must follow the failure counters: {:?}",
        stats
    );
}

#[cfg(test)]
mod happy_path_tests {
    use super::*;

    #[tokio::test]
    async fn test_populated_and_empty_collections() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 2).collection("posts", 0),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success, "errors: {:?}", result.statistics.errors);
        assert_eq!(result.environment, ENVIRONMENT);
        assert_eq!(result.statistics.total_collections, 2);
        assert_eq!(result.statistics.total_records, 2);
        assert_eq!(result.statistics.successful_collections, 1);
        assert_eq!(result.statistics.skipped_collections, 1);
        assert_eq!(result.statistics.failed_collections, 0);
        assert!(result.statistics.errors.is_empty());
        assert!(result.statistics.end_time.is_some());
        assert_success_invariant(&result);

        let dir = run_dir(&result);
        assert!(dir.starts_with(temp.path().join(ENVIRONMENT)));
        assert_eq!(docs_in(&data_file(&result, "users")), 2);
        assert!(!data_file(&result, "posts").exists());
        assert!(!dir.join("schemas").join("posts.schema.json").exists());
        assert!(dir.join("schemas").join("users.schema.json").exists());

        let posts = result.collections.iter().find(|c| c.name == "posts").unwrap();
        assert!(posts.skipped);
        assert!(posts.backup_success);
        assert_eq!(posts.retrieved_count, None);

        let users = result.collections.iter().find(|c| c.name == "users").unwrap();
        assert_eq!(users.record_count, 2);
        assert_eq!(users.retrieved_count, Some(2));
    }

    #[tokio::test]
    async fn test_empty_collection_is_never_fetched() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 2).collection("posts", 0),
            config(temp.path(), 10),
        );

        h.orchestrator.perform_backup(ENVIRONMENT).await;

        let paths = h.cms.requested_paths();
        assert!(paths.contains(&"/api/posts/count".to_string()));
        assert!(!paths.contains(&"/api/posts".to_string()));
    }

    #[tokio::test]
    async fn test_run_artifacts_written() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 3).collection("posts", 1),
            config(temp.path(), 2),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;
        let dir = run_dir(&result);

        let metadata = read_json(&dir.join("metadata.json"));
        assert_eq!(metadata["format_version"], "1.0");
        assert_eq!(metadata["environment"], ENVIRONMENT);
        assert_eq!(metadata["collections"].as_array().unwrap().len(), 2);
        assert_eq!(metadata["rate_limit"]["batch_size"], 2);

        let summary = read_json(&dir.join("summary.json"));
        assert_eq!(summary["success"], true);
        assert_eq!(summary["statistics"]["total_records"], 4);

        let log = std::fs::read_to_string(dir.join("backup.log")).unwrap();
        let events: Vec<String> = log
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .filter_map(|entry| entry["event"].as_str().map(str::to_string))
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("run_started"));
        assert!(events.contains(&"collection_backed_up".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("state_changed"));

        for artifact in ["metadata.json", "summary.json", "backup.log"] {
            let text = std::fs::read_to_string(dir.join(artifact)).unwrap();
            assert!(!text.contains(API_KEY), "{} leaks the API key", artifact);
        }
    }

    #[tokio::test]
    async fn test_multi_page_collection_is_complete() {
        let temp = TempDir::new().unwrap();
        let h = harness(FakeCms::new().collection("users", 7), config(temp.path(), 3));

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success);
        assert!(result.statistics.warnings.is_empty());
        let docs = read_json(&data_file(&result, "users"));
        let ids: Vec<&str> = docs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["id"].as_str().unwrap())
            .collect();
        let expected: Vec<String> = (0..7).map(|i| format!("users-{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_several_environments_in_sequence() {
        let temp = TempDir::new().unwrap();
        let h = harness(FakeCms::new().collection("users", 1), config(temp.path(), 10));

        let results = h
            .orchestrator
            .perform_backups(&[ENVIRONMENT.to_string(), "qa".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(results[1].statistics.errors[0].phase, Phase::Configuration);
    }
}

#[cfg(test)]
mod fatal_failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_failure_stops_the_run() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 2).access_status(401),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert!(result.backup_path.is_none());
        assert_eq!(result.statistics.errors.len(), 1);
        assert_eq!(result.statistics.errors[0].phase, Phase::Connection);
        assert!(result.statistics.errors[0].error.contains("401"));
        assert_eq!(result.statistics.total_collections, 0);
        assert_success_invariant(&result);

        assert_eq!(h.cms.requested_paths(), vec!["/api/access".to_string()]);
        assert!(!temp.path().join(ENVIRONMENT).exists());
        assert_eq!(h.sink.count("connection_failed"), 1);
        assert_eq!(h.sink.count("run_aborted"), 1);
        assert_eq!(h.sink.count("collections_discovered"), 0);
    }

    #[tokio::test]
    async fn test_unknown_environment_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        let h = harness(FakeCms::new().collection("users", 2), config(temp.path(), 10));

        let result = h.orchestrator.perform_backup("qa").await;

        assert!(!result.success);
        assert_eq!(result.environment, "qa");
        assert!(result.backup_path.is_none());
        assert_eq!(result.statistics.errors[0].phase, Phase::Configuration);
        assert!(result.statistics.errors[0].error.contains("qa"));
        assert!(h.cms.requested_paths().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_failure_is_a_general_error() {
        let temp = TempDir::new().unwrap();
        let cms = Arc::new(FakeCms::new().collection("users", 2));
        let orchestrator = BackupOrchestrator::new(config(temp.path(), 10))
            .with_transport(cms.clone())
            .with_store(Arc::new(FaultyStore::new(temp.path(), StoreFault::Metadata)));

        let result = orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert!(result.backup_path.is_none());
        assert_eq!(result.statistics.errors.len(), 1);
        assert_eq!(result.statistics.errors[0].phase, Phase::General);

        // only the discovery sample; no page is fetched once metadata fails
        let user_requests = cms
            .requested_paths()
            .iter()
            .filter(|path| *path == "/api/users")
            .count();
        assert_eq!(user_requests, 1);
    }

    #[tokio::test]
    async fn test_connection_check_helpers() {
        let temp = TempDir::new().unwrap();
        let h = harness(FakeCms::new().collection("users", 2), config(temp.path(), 10));

        let access = h.orchestrator.test_connection(ENVIRONMENT).await.unwrap();
        assert_eq!(access.collection_names(), vec!["users".to_string()]);

        let client = h
            .orchestrator
            .build_client(h.orchestrator.config().environment(ENVIRONMENT).unwrap())
            .unwrap();
        assert!(h.orchestrator.validate_connection(&client).await);

        let denied = harness(FakeCms::new().access_status(403), config(temp.path(), 10));
        let client = denied
            .orchestrator
            .build_client(denied.orchestrator.config().environment(ENVIRONMENT).unwrap())
            .unwrap();
        assert!(!denied.orchestrator.validate_connection(&client).await);
        assert!(denied.orchestrator.test_connection(ENVIRONMENT).await.is_err());
    }
}

#[cfg(test)]
mod isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_discovery_failure_excludes_only_that_collection() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new()
                .collection("posts", 3)
                .collection("users", 2)
                .failing_count("media"),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert_eq!(result.statistics.total_collections, 2);
        assert_eq!(result.statistics.errors_in(Phase::Discovery), 1);
        assert_eq!(result.statistics.errors[0].collection.as_deref(), Some("media"));
        assert_eq!(result.statistics.successful_collections, 2);
        assert_eq!(result.statistics.total_records, 5);
        assert!(result.backup_path.is_some());
        assert_success_invariant(&result);

        assert!(!data_file(&result, "media").exists());
        assert!(!h.cms.requested_paths().contains(&"/api/media".to_string()));
        assert_eq!(h.sink.count("discovery_failed"), 1);
    }

    #[tokio::test]
    async fn test_colliding_slugs_keep_all_documents() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("a:b", 3).collection("a_b", 1),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success, "errors: {:?}", result.statistics.errors);
        assert_eq!(result.statistics.total_records, 4);

        let data_dir = run_dir(&result).join("data");
        let mut files: Vec<String> = std::fs::read_dir(&data_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        files.sort();
        assert_eq!(files, vec!["a_b-1.json", "a_b.json"]);

        let mut on_disk = 0;
        for outcome in &result.collections {
            let file = outcome.data_file.as_deref().expect("data file recorded");
            let docs = read_json(&data_dir.join(file));
            let docs = docs.as_array().unwrap();
            assert_eq!(docs.len() as u64, outcome.retrieved_count.unwrap());
            assert!(docs.iter().all(|doc| {
                doc["id"].as_str().unwrap().starts_with(&format!("{}-", outcome.name))
            }));
            on_disk += docs.len() as u64;
        }
        assert_eq!(on_disk, result.statistics.total_records);

        let summary = read_json(&run_dir(&result).join("summary.json"));
        assert!(summary["collections"]
            .as_array()
            .unwrap()
            .iter()
            .all(|c| c["data_file"].is_string()));
    }

    #[tokio::test]
    async fn test_persistence_failure_marks_collection_failed() {
        let temp = TempDir::new().unwrap();
        let cms = Arc::new(
            FakeCms::new()
                .collection("media", 2)
                .collection("posts", 2)
                .collection("users", 2),
        );
        let store = Arc::new(FaultyStore::new(temp.path(), StoreFault::DataFor("media".to_string())));
        let orchestrator = BackupOrchestrator::new(config(temp.path(), 10))
            .with_transport(cms)
            .with_store(store.clone());

        let result = orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert_eq!(result.statistics.failed_collections, 1);
        assert_eq!(result.statistics.successful_collections, 2);
        assert_eq!(result.statistics.total_records, 4);
        assert_eq!(result.statistics.errors_in(Phase::Backup), 1);
        assert_eq!(result.statistics.errors[0].collection.as_deref(), Some("media"));
        assert_success_invariant(&result);

        let media = result.collections.iter().find(|c| c.name == "media").unwrap();
        assert!(!media.backup_success);
        assert_eq!(store.backup_dir(ENVIRONMENT), result.backup_path);
        assert!(data_file(&result, "users").exists());

        let summary = read_json(&run_dir(&result).join("summary.json"));
        assert_eq!(summary["success"], false);
    }

    #[tokio::test]
    async fn test_excluded_collections_are_not_requested() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new()
                .collection("payload-preferences", 4)
                .collection("payload-migrations", 1)
                .collection("users", 2),
            config_with(temp.path(), 10, |backup| backup.exclude("payload-*")),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success);
        assert_eq!(result.statistics.filtered_collections, 2);
        assert_eq!(result.statistics.total_collections, 1);
        assert!(
            h.cms
                .requested_paths()
                .iter()
                .all(|path| !path.contains("payload-"))
        );

        let metadata = read_json(&run_dir(&result).join("metadata.json"));
        assert_eq!(
            metadata["filtered_collections"],
            serde_json::json!(["payload-migrations", "payload-preferences"])
        );
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::*;

    #[tokio::test]
    async fn test_page_failure_keeps_earlier_pages() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 10).failing_page("users", 3),
            config(temp.path(), 2),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success);
        assert_eq!(result.statistics.total_records, 4);
        assert_eq!(result.statistics.warnings.len(), 1);
        assert!(result.statistics.warnings[0].contains("incomplete"));
        assert_eq!(docs_in(&data_file(&result, "users")), 4);

        let users = &result.collections[0];
        assert_eq!(users.record_count, 10);
        assert_eq!(users.retrieved_count, Some(4));

        // one schema sample plus pages 1 to 3; page 4 is never requested
        let page_requests = h
            .cms
            .requested_paths()
            .iter()
            .filter(|path| *path == "/api/users")
            .count();
        assert_eq!(page_requests, 4);
        assert_eq!(h.sink.count("pagination_truncated"), 1);
    }

    #[tokio::test]
    async fn test_strict_pagination_fails_truncated_collection() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new()
                .collection("posts", 2)
                .collection("users", 10)
                .failing_page("users", 3),
            config_with(temp.path(), 2, |backup| backup.with_strict_pagination(true)),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert_eq!(result.statistics.failed_collections, 1);
        assert_eq!(result.statistics.successful_collections, 1);
        assert_eq!(result.statistics.errors_in(Phase::Backup), 1);
        assert!(result.statistics.errors[0].error.contains("page 3"));
        assert!(!data_file(&result, "users").exists());
        assert!(data_file(&result, "posts").exists());
        assert_success_invariant(&result);
    }

    #[tokio::test]
    async fn test_first_page_failure_fails_the_collection() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 4).failing_page("users", 1),
            config(temp.path(), 2),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(!result.success);
        assert_eq!(result.statistics.failed_collections, 1);
        assert!(!data_file(&result, "users").exists());
    }

    #[tokio::test]
    async fn test_count_drift_is_a_warning() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 2).reported_count("users", 5),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success);
        assert_eq!(result.statistics.total_records, 2);
        assert_eq!(result.statistics.warnings.len(), 1);
        assert!(result.statistics.warnings[0].contains("changed during backup"));
        assert_eq!(result.collections[0].record_count, 5);
        assert_eq!(result.collections[0].retrieved_count, Some(2));
    }

    #[tokio::test]
    async fn test_schema_sample_failure_keeps_collection() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("users", 3).failing_sample("users"),
            config(temp.path(), 10),
        );

        let result = h.orchestrator.perform_backup(ENVIRONMENT).await;

        assert!(result.success);
        assert_eq!(result.statistics.total_records, 3);
        assert_eq!(result.statistics.warnings.len(), 1);
        assert_eq!(h.sink.count("schema_probe_failed"), 1);

        let metadata = read_json(&run_dir(&result).join("metadata.json"));
        assert!(metadata["collections"][0]["schema_error"].is_string());
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[tokio::test]
    async fn test_event_sequence() {
        let temp = TempDir::new().unwrap();
        let h = harness(
            FakeCms::new().collection("posts", 0).collection("users", 2),
            config(temp.path(), 10),
        );

        h.orchestrator.perform_backup(ENVIRONMENT).await;

        let milestones: Vec<&str> = h
            .sink
            .names()
            .into_iter()
            .filter(|name| *name != "state_changed")
            .collect();
        assert_eq!(
            milestones,
            vec![
                "run_started",
                "connection_validated",
                "collections_discovered",
                "collection_skipped",
                "collection_started",
                "collection_backed_up",
                "run_finished",
            ]
        );
        assert_eq!(h.sink.count("state_changed"), 5);
        assert!(
            h.sink
                .events()
                .iter()
                .all(|event| event.environment() == ENVIRONMENT)
        );
    }
}
