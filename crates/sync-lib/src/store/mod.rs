//! Resource store access
//!
//! The sync emitter talks to the store only through [`ResourceStore`].
//! Two backends are provided: an in-process store (optionally persisted
//! to a JSON file) and MongoDB.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use crate::error::{Result, SyncError};
use crate::models::{ResourceKey, ResourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use async_trait::async_trait;

/// A record as held by the store, with the store's own identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    #[serde(rename = "_id")]
    pub store_id: String,
    #[serde(flatten)]
    pub record: ResourceRecord,
}

/// Which branch an upsert took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted { store_id: String },
    Updated { store_id: String },
}

impl UpsertOutcome {
    pub fn store_id(&self) -> &str {
        match self {
            UpsertOutcome::Inserted { store_id } | UpsertOutcome::Updated { store_id } => store_id,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            UpsertOutcome::Inserted { .. } => "inserted",
            UpsertOutcome::Updated { .. } => "updated",
        }
    }
}

/// Trait for resource store implementations
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Find the stored record matching a reconciliation key
    async fn find(&self, key: &ResourceKey) -> Result<Option<StoredResource>>;

    /// Insert a new record, returning its store id
    async fn insert(&self, record: &ResourceRecord) -> Result<String>;

    /// Overwrite the stored record with `store_id`
    ///
    /// Every field is replaced except `createdAt`, which keeps the value
    /// from the first insert.
    async fn replace(&self, store_id: &str, record: &ResourceRecord) -> Result<()>;

    /// Update-if-exists-else-insert keyed by `record.key()`
    ///
    /// The default is a find followed by a write and is not atomic.
    /// Backends with a native upsert override it.
    async fn upsert(&self, record: &ResourceRecord) -> Result<UpsertOutcome> {
        match self.find(&record.key()).await? {
            Some(existing) => {
                self.replace(&existing.store_id, record).await?;
                Ok(UpsertOutcome::Updated {
                    store_id: existing.store_id,
                })
            }
            None => {
                let store_id = self.insert(record).await?;
                Ok(UpsertOutcome::Inserted { store_id })
            }
        }
    }

    /// Number of live records owned by an organization
    async fn count_by_org(&self, org_id: &str) -> Result<u64>;

    /// Live records of an organization grouped by resource type
    async fn count_by_type(&self, org_id: &str) -> Result<BTreeMap<String, u64>>;

    /// Live records of an organization carrying `label = "true"`
    async fn count_by_label(&self, org_id: &str, label: &str) -> Result<u64>;
}

/// Store backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, discarded at exit
    #[default]
    Memory,
    /// In-process store persisted to a JSON file
    File,
    /// MongoDB collection
    Mongo,
}

/// Store connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    /// File path for the `file` backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Connection string for the `mongo` backend
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database() -> String {
    "core_aiwm".to_string()
}

fn default_collection() -> String {
    "resources".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            uri: default_uri(),
            database: default_database(),
            collection: default_collection(),
        }
    }
}

/// Open the store described by `settings`
pub async fn connect(settings: &StoreSettings) -> Result<Arc<dyn ResourceStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory resource store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File => {
            let path = settings.path.clone().ok_or_else(|| {
                SyncError::Config("the file store backend requires store.path".to_string())
            })?;
            tracing::info!(path = %path.display(), "Using file-backed resource store");
            Ok(Arc::new(MemoryStore::with_persistence(path)?))
        }
        StoreBackend::Mongo => {
            let store =
                MongoStore::connect(&settings.uri, &settings.database, &settings.collection)
                    .await?;
            Ok(Arc::new(store))
        }
    }
}
