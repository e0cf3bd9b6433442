//! In-process resource store
//!
//! Keeps documents in insertion order behind a single lock. With a
//! persistence path, every write is flushed to a JSON file through a
//! temp-file rename so a crash never leaves a half-written store.

use super::{async_trait, ResourceStore, StoredResource, UpsertOutcome};
use crate::error::{Result, SyncError};
use crate::models::{ResourceKey, ResourceRecord};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    documents: Vec<StoredResource>,
    next_id: u64,
}

impl MemoryState {
    fn position(&self, key: &ResourceKey) -> Option<usize> {
        self.documents.iter().position(|doc| {
            doc.record.node_id == key.node_id && doc.record.runtime.id == key.runtime_id
        })
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("res-{:06}", self.next_id)
    }

    fn insert(&mut self, record: &ResourceRecord) -> String {
        let store_id = self.allocate_id();
        self.documents.push(StoredResource {
            store_id: store_id.clone(),
            record: record.clone(),
        });
        store_id
    }

    fn replace_at(&mut self, index: usize, record: &ResourceRecord) {
        let existing = &mut self.documents[index];
        let created_at = existing.record.created_at;
        existing.record = record.clone();
        existing.record.created_at = created_at;
    }

    fn owned_by(&self, org_id: &str) -> impl Iterator<Item = &StoredResource> {
        let org_id = org_id.to_string();
        self.documents
            .iter()
            .filter(move |doc| doc.record.owner.org_id == org_id)
    }
}

/// Resource store held in process memory
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    persistence_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty, non-persistent store
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            persistence_path: None,
        }
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ResourceRecord>) -> Self {
        let mut state = MemoryState::default();
        for record in records {
            state.insert(&record);
        }
        Self {
            state: RwLock::new(state),
            persistence_path: None,
        }
    }

    /// Open a store persisted at `path`, loading existing documents
    pub fn with_persistence(path: PathBuf) -> Result<Self> {
        let mut state = MemoryState::default();

        if path.exists() {
            let data = std::fs::read(&path).map_err(|e| {
                SyncError::Store(format!("failed to read store file {}: {}", path.display(), e))
            })?;
            let documents: Vec<StoredResource> = serde_json::from_slice(&data).map_err(|e| {
                SyncError::Store(format!("failed to parse store file {}: {}", path.display(), e))
            })?;

            state.next_id = documents
                .iter()
                .filter_map(|doc| doc.store_id.strip_prefix("res-"))
                .filter_map(|n| n.parse::<u64>().ok())
                .max()
                .unwrap_or(0);
            state.documents = documents;
            info!(path = %path.display(), documents = state.documents.len(), "Loaded resource store from disk");
        }

        Ok(Self {
            state: RwLock::new(state),
            persistence_path: Some(path),
        })
    }

    /// Snapshot of all stored documents, in insertion order
    pub async fn documents(&self) -> Vec<StoredResource> {
        self.state.read().await.documents.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.documents.is_empty()
    }

    /// Apply `change` to a copy of the state and keep the copy only once it
    /// is on disk. A failed flush leaves `state` untouched.
    fn commit<T>(
        &self,
        state: &mut MemoryState,
        change: impl FnOnce(&mut MemoryState) -> Result<T>,
    ) -> Result<T> {
        let Some(path) = &self.persistence_path else {
            return change(state);
        };

        let mut next = state.clone();
        let value = change(&mut next)?;
        save_to_disk(path, &next.documents)?;
        debug!(path = %path.display(), documents = next.documents.len(), "Resource store flushed to disk");
        *state = next;
        Ok(value)
    }
}

fn save_to_disk(path: &Path, documents: &[StoredResource]) -> Result<()> {
    let io_err = |what: &str, e: std::io::Error| {
        SyncError::Store(format!("failed to {} {}: {}", what, path.display(), e))
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err("create directory for", e))?;
    }

    let json = serde_json::to_vec_pretty(documents)
        .map_err(|e| SyncError::Store(format!("failed to serialize store: {}", e)))?;

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| io_err("create temp file for", e))?;

    file.write_all(&json).map_err(|e| io_err("write", e))?;
    file.sync_all().map_err(|e| io_err("sync", e))?;

    std::fs::rename(&temp_path, path).map_err(|e| io_err("replace", e))?;
    Ok(())
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn find(&self, key: &ResourceKey) -> Result<Option<StoredResource>> {
        let state = self.state.read().await;
        Ok(state.position(key).map(|i| state.documents[i].clone()))
    }

    async fn insert(&self, record: &ResourceRecord) -> Result<String> {
        let mut state = self.state.write().await;
        self.commit(&mut state, |state| Ok(state.insert(record)))
    }

    async fn replace(&self, store_id: &str, record: &ResourceRecord) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state
            .documents
            .iter()
            .position(|doc| doc.store_id == store_id)
            .ok_or_else(|| SyncError::Store(format!("no resource with id {}", store_id)))?;
        self.commit(&mut state, |state| {
            state.replace_at(index, record);
            Ok(())
        })
    }

    /// Find and write under one lock, so concurrent upserts of the same key
    /// cannot both insert
    async fn upsert(&self, record: &ResourceRecord) -> Result<UpsertOutcome> {
        let mut state = self.state.write().await;
        self.commit(&mut state, |state| {
            Ok(match state.position(&record.key()) {
                Some(index) => {
                    state.replace_at(index, record);
                    UpsertOutcome::Updated {
                        store_id: state.documents[index].store_id.clone(),
                    }
                }
                None => UpsertOutcome::Inserted {
                    store_id: state.insert(record),
                },
            })
        })
    }

    async fn count_by_org(&self, org_id: &str) -> Result<u64> {
        Ok(self.state.read().await.owned_by(org_id).count() as u64)
    }

    async fn count_by_type(&self, org_id: &str) -> Result<BTreeMap<String, u64>> {
        let state = self.state.read().await;
        let mut counts = BTreeMap::new();
        for doc in state.owned_by(org_id) {
            *counts
                .entry(doc.record.resource_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn count_by_label(&self, org_id: &str, label: &str) -> Result<u64> {
        let state = self.state.read().await;
        let count = state
            .owned_by(org_id)
            .filter(|doc| doc.record.metadata.labels.get(label).map(String::as_str) == Some("true"))
            .count();
        Ok(count as u64)
    }
}
