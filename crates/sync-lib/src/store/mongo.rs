//! MongoDB resource store
//!
//! Documents live in one collection (by default `resources`). Upserts are
//! a single `update_one` with `upsert: true`, so the lookup and the write
//! are atomic per reconciliation key. Timestamps are stored as BSON dates
//! with millisecond precision.

use super::{async_trait, ResourceStore, StoredResource, UpsertOutcome};
use crate::error::{Result, SyncError};
use crate::models::{ResourceKey, ResourceRecord};
use bson::{doc, oid::ObjectId, Bson, Document};
use chrono::{DateTime, Utc};
use mongodb::{options::ClientOptions, Client, Collection};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

/// Resource store backed by a MongoDB collection
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and verify the server is reachable
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self> {
        debug!(database = %database, collection = %collection, "Connecting to MongoDB");

        let options = ClientOptions::parse(uri).await.map_err(|e| {
            error!(error = %e, "Failed to parse MongoDB URI");
            SyncError::Config(format!("invalid MongoDB URI: {}", e))
        })?;
        let client = Client::with_options(options)?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await.map_err(|e| {
            error!(error = %e, "Failed to reach MongoDB");
            SyncError::Store(format!("failed to connect to MongoDB: {}", e))
        })?;

        info!(database = %database, collection = %collection, "Connected to MongoDB resource store");
        Ok(Self {
            collection: db.collection(collection),
        })
    }
}

fn key_filter(key: &ResourceKey) -> Document {
    doc! {
        "nodeId": key.node_id.as_str(),
        "runtime.id": key.runtime_id.as_str(),
    }
}

fn org_filter(org_id: &str) -> Document {
    doc! { "owner.orgId": org_id }
}

fn object_id(store_id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(store_id)
        .map_err(|e| SyncError::Store(format!("invalid resource id {}: {}", store_id, e)))
}

fn id_of(document: &Document) -> Result<String> {
    document
        .get_object_id("_id")
        .map(|id| id.to_hex())
        .map_err(|e| SyncError::Store(format!("document without ObjectId _id: {}", e)))
}

const DATE_FIELDS: &[&str] = &["lastHealthCheck", "deletedAt", "createdAt", "updatedAt"];
const RUNTIME_DATE_FIELDS: &[&str] = &["startedAt", "stoppedAt"];

fn rewrite_dates(document: &mut Document, rewrite: fn(&Bson) -> Option<Bson>) {
    rewrite_fields(document, DATE_FIELDS, rewrite);
    if let Ok(runtime) = document.get_document_mut("runtime") {
        rewrite_fields(runtime, RUNTIME_DATE_FIELDS, rewrite);
    }
}

fn rewrite_fields(
    document: &mut Document,
    fields: &[&str],
    rewrite: fn(&Bson) -> Option<Bson>,
) {
    for field in fields {
        if let Some(value) = document.get_mut(*field) {
            if let Some(rewritten) = rewrite(value) {
                *value = rewritten;
            }
        }
    }
}

fn to_bson_date(value: &Bson) -> Option<Bson> {
    match value {
        Bson::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| Bson::DateTime(bson::DateTime::from_millis(at.timestamp_millis()))),
        _ => None,
    }
}

fn from_bson_date(value: &Bson) -> Option<Bson> {
    match value {
        Bson::DateTime(at) => DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis())
            .map(|at| Bson::String(at.to_rfc3339())),
        _ => None,
    }
}

/// Record as stored: timestamps become BSON dates
fn to_store_document(record: &ResourceRecord) -> Result<Document> {
    let mut document = bson::to_document(record)?;
    rewrite_dates(&mut document, to_bson_date);
    Ok(document)
}

fn from_store_document(mut document: Document) -> Result<ResourceRecord> {
    rewrite_dates(&mut document, from_bson_date);
    Ok(bson::from_document(document)?)
}

/// Split a record into its `$set` fields and its `createdAt`
fn update_parts(record: &ResourceRecord) -> Result<(Document, Bson)> {
    let mut set = to_store_document(record)?;
    let created_at = set.remove("createdAt").unwrap_or(Bson::Null);
    Ok((set, created_at))
}

fn as_count(value: Option<&Bson>) -> u64 {
    match value {
        Some(Bson::Int32(n)) => (*n).max(0) as u64,
        Some(Bson::Int64(n)) => (*n).max(0) as u64,
        Some(Bson::Double(n)) => n.max(0.0) as u64,
        _ => 0,
    }
}

#[async_trait]
impl ResourceStore for MongoStore {
    async fn find(&self, key: &ResourceKey) -> Result<Option<StoredResource>> {
        match self.collection.find_one(key_filter(key)).await? {
            Some(document) => {
                let store_id = id_of(&document)?;
                let record = from_store_document(document)?;
                Ok(Some(StoredResource { store_id, record }))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &ResourceRecord) -> Result<String> {
        let document = to_store_document(record)?;
        let result = self.collection.insert_one(document).await?;
        match result.inserted_id {
            Bson::ObjectId(id) => Ok(id.to_hex()),
            other => Ok(other.to_string()),
        }
    }

    async fn replace(&self, store_id: &str, record: &ResourceRecord) -> Result<()> {
        let id = object_id(store_id)?;
        let (set, _) = update_parts(record)?;
        let result = self
            .collection
            .update_one(doc! { "_id": id }, doc! { "$set": set })
            .await?;

        if result.matched_count == 0 {
            return Err(SyncError::Store(format!("no resource with id {}", store_id)));
        }
        Ok(())
    }

    async fn upsert(&self, record: &ResourceRecord) -> Result<UpsertOutcome> {
        let filter = key_filter(&record.key());
        let (set, created_at) = update_parts(record)?;

        let result = self
            .collection
            .update_one(
                filter.clone(),
                doc! {
                    "$set": set,
                    "$setOnInsert": { "createdAt": created_at },
                },
            )
            .upsert(true)
            .await?;

        if let Some(id) = result.upserted_id {
            let store_id = match id {
                Bson::ObjectId(oid) => oid.to_hex(),
                other => other.to_string(),
            };
            return Ok(UpsertOutcome::Inserted { store_id });
        }

        let existing = self
            .collection
            .find_one(filter)
            .projection(doc! { "_id": 1 })
            .await?
            .ok_or_else(|| SyncError::Store(format!("resource {} vanished after update", record.key())))?;

        Ok(UpsertOutcome::Updated {
            store_id: id_of(&existing)?,
        })
    }

    async fn count_by_org(&self, org_id: &str) -> Result<u64> {
        Ok(self.collection.count_documents(org_filter(org_id)).await?)
    }

    async fn count_by_type(&self, org_id: &str) -> Result<BTreeMap<String, u64>> {
        let pipeline = vec![
            doc! { "$match": org_filter(org_id) },
            doc! { "$group": { "_id": "$resourceType", "count": { "$sum": 1 } } },
        ];

        let mut cursor = self.collection.aggregate(pipeline).await?;
        let mut counts = BTreeMap::new();
        while cursor.advance().await? {
            let group = cursor.deserialize_current()?;
            let resource_type = match group.get("_id") {
                Some(Bson::String(s)) => s.clone(),
                Some(Bson::Null) | None => "unknown".to_string(),
                Some(other) => other.to_string(),
            };
            counts.insert(resource_type, as_count(group.get("count")));
        }
        Ok(counts)
    }

    async fn count_by_label(&self, org_id: &str, label: &str) -> Result<u64> {
        let mut filter = org_filter(org_id);
        filter.insert(format!("metadata.labels.{}", label), "true");
        Ok(self.collection.count_documents(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Owner, ResourceConfig, ResourceMetadata, ResourceType, RuntimeInfo};
    use chrono::TimeZone;

    fn record(started: DateTime<Utc>, synced: DateTime<Utc>) -> ResourceRecord {
        ResourceRecord {
            name: "qwen25-7b".to_string(),
            description: "Container: vllm/vllm-openai:v0.6.0".to_string(),
            resource_type: ResourceType::InferenceContainer,
            node_id: "node-1".to_string(),
            status: "running".to_string(),
            config: ResourceConfig {
                resource_type: ResourceType::InferenceContainer,
                registry: "local".to_string(),
                image_name: "vllm/vllm-openai".to_string(),
                image_tag: "v0.6.0".to_string(),
                container_ports: Vec::new(),
                volume_mounts: Vec::new(),
                env_vars: Default::default(),
                network_mode: "bridge".to_string(),
                restart_policy: "unless-stopped".to_string(),
                inference_server: Some("vllm".to_string()),
                model_repository: None,
                gpu_device_ids: Vec::new(),
                cpu_limit: None,
                ram_limit: None,
            },
            runtime: RuntimeInfo {
                id: "999e628dab46".to_string(),
                endpoint: String::new(),
                allocated_gpu: Vec::new(),
                allocated_cpu: None,
                allocated_ram: None,
                started_at: Some(started),
                stopped_at: None,
            },
            last_health_check: synced,
            error_message: None,
            metadata: ResourceMetadata {
                labels: Default::default(),
            },
            owner: Owner {
                user_id: "user-1".to_string(),
                org_id: "org-1".to_string(),
            },
            created_by: "user-1".to_string(),
            updated_by: "user-1".to_string(),
            deleted_at: None,
            created_at: synced,
            updated_at: synced,
        }
    }

    #[test]
    fn test_key_filter_uses_composite_key() {
        let filter = key_filter(&ResourceKey {
            node_id: "node-1".to_string(),
            runtime_id: "abc".to_string(),
        });
        assert_eq!(filter.get_str("nodeId").unwrap(), "node-1");
        assert_eq!(filter.get_str("runtime.id").unwrap(), "abc");
    }

    #[test]
    fn test_org_filter_includes_deleted() {
        let filter = org_filter("org-1");
        assert_eq!(filter.get_str("owner.orgId").unwrap(), "org-1");
        assert!(filter.get("deletedAt").is_none());
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_timestamps_are_stored_as_dates() {
        let started = Utc.with_ymd_and_hms(2025, 12, 3, 0, 58, 23).unwrap();
        let synced = Utc.with_ymd_and_hms(2025, 12, 3, 1, 0, 0).unwrap();
        let record = record(started, synced);

        let document = to_store_document(&record).unwrap();
        assert_eq!(
            document.get("createdAt"),
            Some(&Bson::DateTime(bson::DateTime::from_millis(synced.timestamp_millis())))
        );
        assert!(matches!(document.get("updatedAt"), Some(Bson::DateTime(_))));
        assert!(matches!(document.get("lastHealthCheck"), Some(Bson::DateTime(_))));
        assert_eq!(document.get("deletedAt"), Some(&Bson::Null));

        let runtime = document.get_document("runtime").unwrap();
        assert!(matches!(runtime.get("startedAt"), Some(Bson::DateTime(_))));
        assert_eq!(runtime.get("stoppedAt"), Some(&Bson::Null));

        assert_eq!(from_store_document(document).unwrap(), record);
    }

    #[test]
    fn test_update_parts_split_created_at() {
        let at = Utc.with_ymd_and_hms(2025, 12, 3, 1, 0, 0).unwrap();
        let (set, created_at) = update_parts(&record(at, at)).unwrap();

        assert!(set.get("createdAt").is_none());
        assert!(matches!(set.get("updatedAt"), Some(Bson::DateTime(_))));
        assert!(matches!(created_at, Bson::DateTime(_)));
    }

    #[test]
    fn test_object_id_parsing() {
        assert!(object_id("692ff5fa3371dad36b287ec5").is_ok());
        assert!(matches!(object_id("res-000001"), Err(SyncError::Store(_))));
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(Some(&Bson::Int32(3))), 3);
        assert_eq!(as_count(Some(&Bson::Int64(7))), 7);
        assert_eq!(as_count(None), 0);
    }
}
