//! Synchronization of container snapshots into the resource store
//!
//! This module provides:
//! - The per-record upsert loop with cancellation between records
//! - Run reports with per-record outcomes and verification counts
//! - A pipeline tying input decoding, record building and emission together

mod emitter;
mod report;

#[cfg(test)]
mod tests;

pub use emitter::SyncEmitter;
pub use report::{RecordAction, RecordOutcome, SyncFailure, SyncReport, VerificationSummary};

use crate::builder::{PendingRecord, ResourceBuilder};
use crate::classifier::Classifier;
use crate::input::decode_records;
use crate::models::SyncIdentity;
use crate::store::ResourceStore;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Raw inspection records in, sync report out
pub struct SyncPipeline {
    builder: ResourceBuilder,
    emitter: SyncEmitter,
}

impl SyncPipeline {
    pub fn new(
        identity: SyncIdentity,
        classifier: Classifier,
        store: Arc<dyn ResourceStore>,
    ) -> Self {
        Self {
            emitter: SyncEmitter::new(store, identity.clone()),
            builder: ResourceBuilder::new(identity, classifier),
        }
    }

    /// Decode and build every record without touching the store
    pub fn prepare(&self, records: Vec<Value>, now: DateTime<Utc>) -> Vec<PendingRecord> {
        self.builder.prepare_all(decode_records(records), now)
    }

    /// Decode, build and upsert every record
    pub async fn run(
        &self,
        records: Vec<Value>,
        now: DateTime<Utc>,
        shutdown: broadcast::Receiver<()>,
    ) -> SyncReport {
        let pending = self.prepare(records, now);
        self.emitter.run(pending, shutdown).await
    }
}
