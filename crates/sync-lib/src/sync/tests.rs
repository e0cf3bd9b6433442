//! Integration tests for the sync module
//!
//! These tests verify:
//! - Idempotent re-runs against the same store
//! - Error tallying when the store rejects writes
//! - Cancellation between records
//! - File-store writes that never reach disk

use super::*;
use crate::classifier::ClassificationTable;
use crate::error::{Result, SyncError};
use crate::models::{ResourceKey, ResourceRecord, LABEL_INFERENCE, LABEL_SYSTEM};
use crate::store::{async_trait, MemoryStore, StoredResource};
use chrono::TimeZone;
use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn identity() -> SyncIdentity {
    SyncIdentity {
        org_id: "org-1".to_string(),
        user_id: "user-1".to_string(),
        node_id: "node-1".to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 3, 1, 0, 0).unwrap()
}

fn later() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 4, 9, 30, 0).unwrap()
}

fn pipeline(store: Arc<dyn ResourceStore>) -> SyncPipeline {
    SyncPipeline::new(
        identity(),
        Classifier::new(ClassificationTable::builtin()),
        store,
    )
}

/// Snapshot with two inference containers and one application container
fn snapshot() -> Vec<Value> {
    vec![
        json!({
            "Id": "999e628dab46",
            "Name": "/qwen25-7b",
            "Config": {"Image": "vllm/vllm-openai:v0.6.0"},
            "HostConfig": {
                "PortBindings": {"8000/tcp": [{"HostPort": "3901"}]},
                "DeviceRequests": [{"Driver": "nvidia", "DeviceIDs": ["1"]}]
            },
            "State": {"StartedAt": "2025-12-03T00:58:23.118719925Z"}
        }),
        json!({
            "Id": "4a0b1c2d3e4f",
            "Name": "/yolov8",
            "Config": {"Image": "nvcr.io/nvidia/tritonserver:24.01-py3"},
            "HostConfig": {
                "PortBindings": {
                    "8000/tcp": [{"HostPort": "3911"}],
                    "8001/tcp": [{"HostPort": "3912"}]
                }
            }
        }),
        json!({
            "Id": "c0ffee000001",
            "Name": "/custom-app",
            "Config": {"Image": "nginx:1.25"}
        }),
    ]
}

async fn sync(pipeline: &SyncPipeline, records: Vec<Value>, at: DateTime<Utc>) -> SyncReport {
    let (_tx, rx) = broadcast::channel(1);
    pipeline.run(records, at, rx).await
}

/// Store that refuses to insert the named containers
struct FailingStore {
    fail_names: Vec<String>,
    inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for FailingStore {
    async fn find(&self, key: &ResourceKey) -> Result<Option<StoredResource>> {
        self.inner.find(key).await
    }

    async fn insert(&self, record: &ResourceRecord) -> Result<String> {
        if self.fail_names.contains(&record.name) {
            return Err(SyncError::Store("connection reset".to_string()));
        }
        self.inner.insert(record).await
    }

    async fn replace(&self, store_id: &str, record: &ResourceRecord) -> Result<()> {
        self.inner.replace(store_id, record).await
    }

    async fn count_by_org(&self, org_id: &str) -> Result<u64> {
        self.inner.count_by_org(org_id).await
    }

    async fn count_by_type(&self, org_id: &str) -> Result<BTreeMap<String, u64>> {
        self.inner.count_by_type(org_id).await
    }

    async fn count_by_label(&self, org_id: &str, label: &str) -> Result<u64> {
        self.inner.count_by_label(org_id, label).await
    }
}

/// Store that accepts writes but cannot answer verification queries
struct BlindStore {
    inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for BlindStore {
    async fn find(&self, key: &ResourceKey) -> Result<Option<StoredResource>> {
        self.inner.find(key).await
    }

    async fn insert(&self, record: &ResourceRecord) -> Result<String> {
        self.inner.insert(record).await
    }

    async fn replace(&self, store_id: &str, record: &ResourceRecord) -> Result<()> {
        self.inner.replace(store_id, record).await
    }

    async fn count_by_org(&self, _org_id: &str) -> Result<u64> {
        Err(SyncError::Store("count unavailable".to_string()))
    }

    async fn count_by_type(&self, org_id: &str) -> Result<BTreeMap<String, u64>> {
        self.inner.count_by_type(org_id).await
    }

    async fn count_by_label(&self, org_id: &str, label: &str) -> Result<u64> {
        self.inner.count_by_label(org_id, label).await
    }
}

mod emitter_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_run_inserts_everything() {
        let store = Arc::new(MemoryStore::new());
        let report = sync(&pipeline(store.clone()), snapshot(), now()).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.success, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.updated, 0);
        assert_eq!(report.errors, 0);
        assert!(!report.cancelled);
        assert!(report.is_consistent());
        assert_eq!(store.len().await, 3);

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["qwen25-7b", "yolov8", "custom-app"]);
        assert_eq!(report.outcomes[1].ports, vec!["8000:3911", "8001:3912"]);
        assert_eq!(report.outcomes[0].gpus, vec!["1"]);
    }

    #[tokio::test]
    async fn test_second_run_updates_in_place() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone());

        sync(&p, snapshot(), now()).await;
        let first = store.documents().await;

        let report = sync(&p, snapshot(), now()).await;
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 3);
        assert_eq!(store.documents().await, first);
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone());

        sync(&p, snapshot(), now()).await;
        sync(&p, snapshot(), later()).await;

        for doc in store.documents().await {
            assert_eq!(doc.record.created_at, now());
            assert_eq!(doc.record.updated_at, later());
            assert_eq!(doc.record.last_health_check, later());
        }
    }

    #[tokio::test]
    async fn test_same_input_gives_same_documents() {
        let a = Arc::new(MemoryStore::new());
        let b = Arc::new(MemoryStore::new());

        sync(&pipeline(a.clone()), snapshot(), now()).await;
        sync(&pipeline(b.clone()), snapshot(), now()).await;

        assert_eq!(a.documents().await, b.documents().await);
    }

    #[tokio::test]
    async fn test_preexisting_resource_counts_as_updated() {
        let p = pipeline(Arc::new(MemoryStore::new()));
        let existing = p
            .prepare(vec![snapshot()[0].clone()], now())
            .remove(0)
            .record
            .unwrap();

        let store = Arc::new(MemoryStore::with_records([existing]));
        let report = sync(&pipeline(store.clone()), snapshot(), later()).await;

        assert_eq!(report.updated, 1);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.outcomes[0].action, RecordAction::Updated);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_store_failure_is_counted_and_batch_continues() {
        let store = Arc::new(FailingStore {
            fail_names: vec!["yolov8".to_string()],
            inner: MemoryStore::new(),
        });
        let report = sync(&pipeline(store), snapshot(), now()).await;

        assert_eq!(report.success, 2);
        assert_eq!(report.errors, 1);
        assert!(report.is_consistent());
        assert_eq!(report.outcomes[1].action, RecordAction::Failed);
        assert_eq!(report.outcomes[2].action, RecordAction::Inserted);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].name, "yolov8");
        assert!(report.failures[0].message.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_malformed_records_are_errors() {
        let store = Arc::new(MemoryStore::new());
        let mut records = snapshot();
        records.insert(1, json!({"Name": "/missing-id"}));
        records.push(json!("not a container"));
        records.push(json!({
            "Id": "bad-port",
            "Name": "/bad-port",
            "HostConfig": {"PortBindings": {"http/tcp": [{"HostPort": "80"}]}}
        }));

        let report = sync(&pipeline(store.clone()), records, now()).await;

        assert_eq!(report.total, 6);
        assert_eq!(report.success, 3);
        assert_eq!(report.errors, 3);
        assert!(report.is_consistent());
        assert_eq!(store.len().await, 3);
        assert!(report
            .outcomes
            .iter()
            .filter(|o| o.action == RecordAction::Rejected)
            .all(|o| o.error.is_some()));
    }

    #[tokio::test]
    async fn test_empty_input_still_verifies() {
        let report = sync(&pipeline(Arc::new(MemoryStore::new())), Vec::new(), now()).await;

        assert_eq!(report.total, 0);
        assert!(report.is_consistent());

        let verification = report.verification.unwrap();
        assert_eq!(verification.total_resources, 0);
        assert_eq!(verification.by_label.get(LABEL_INFERENCE), Some(&0));
        assert_eq!(verification.by_label.get(LABEL_SYSTEM), Some(&0));
    }

    #[tokio::test]
    async fn test_verification_counts() {
        let report = sync(&pipeline(Arc::new(MemoryStore::new())), snapshot(), now()).await;
        let verification = report.verification.unwrap();

        assert_eq!(verification.total_resources, 3);
        assert_eq!(verification.by_type.get("inference-container"), Some(&2));
        assert_eq!(verification.by_type.get("application-container"), Some(&1));
        assert_eq!(verification.by_label.get(LABEL_INFERENCE), Some(&2));
        assert_eq!(verification.by_label.get(LABEL_SYSTEM), Some(&1));
        assert!(report.verification_error.is_none());
    }

    #[tokio::test]
    async fn test_verification_failure_keeps_write_results() {
        let store = Arc::new(BlindStore {
            inner: MemoryStore::new(),
        });
        let report = sync(&pipeline(store), snapshot(), now()).await;

        assert_eq!(report.success, 3);
        assert!(report.verification.is_none());
        assert!(report
            .verification_error
            .as_deref()
            .unwrap()
            .contains("count unavailable"));
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_before_start_skips_everything() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let report = pipeline(store.clone()).run(snapshot(), now(), rx).await;

        assert!(report.cancelled);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.success, 0);
        assert!(report.is_consistent());
        assert!(store.is_empty().await);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.action == RecordAction::Skipped));
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_a_cancellation() {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = broadcast::channel::<()>(1);
        drop(tx);

        let report = pipeline(store.clone()).run(snapshot(), now(), rx).await;

        assert!(!report.cancelled);
        assert_eq!(report.success, 3);
    }

    #[tokio::test]
    async fn test_interrupted_run_resumes_cleanly() {
        let store = Arc::new(MemoryStore::new());
        let p = pipeline(store.clone());

        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        p.run(snapshot(), now(), rx).await;

        let report = sync(&p, snapshot(), now()).await;
        assert_eq!(report.inserted, 3);
        assert_eq!(store.len().await, 3);
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_runs_are_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resources.json");

        {
            let store = Arc::new(MemoryStore::with_persistence(path.clone()).unwrap());
            let report = sync(&pipeline(store), snapshot(), now()).await;
            assert_eq!(report.inserted, 3);
        }
        let first = std::fs::read_to_string(&path).unwrap();

        let store = Arc::new(MemoryStore::with_persistence(path.clone()).unwrap());
        let report = sync(&pipeline(store), snapshot(), now()).await;
        assert_eq!(report.updated, 3);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[tokio::test]
    async fn test_unflushed_writes_are_not_counted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("resources.json");
        std::fs::create_dir(path.with_extension("tmp")).unwrap();

        let store = Arc::new(MemoryStore::with_persistence(path.clone()).unwrap());
        let report = sync(&pipeline(store.clone()), snapshot(), now()).await;

        assert_eq!(report.success, 0);
        assert_eq!(report.errors, 3);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.action == RecordAction::Failed));
        assert!(store.is_empty().await);
        assert!(!path.exists());

        let verification = report.verification.unwrap();
        assert_eq!(verification.total_resources, 0);
        assert!(verification.by_type.is_empty());
    }
}
