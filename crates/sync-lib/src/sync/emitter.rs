//! Per-record upsert loop
//!
//! Walks the built records in input order, writes each one through the
//! store's upsert, and tallies the outcome. A failed write is reported and
//! never retried. After the loop the store is queried for the
//! organization-wide verification counts.

use super::report::{RecordAction, RecordOutcome, SyncReport, VerificationSummary};
use crate::builder::PendingRecord;
use crate::error::Result;
use crate::models::{
    ResourceRecord, ResourceType, SyncIdentity, LABEL_INFERENCE, LABEL_SYSTEM,
};
use crate::observability::{StructuredLogger, SyncMetrics};
use crate::store::{ResourceStore, UpsertOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::debug;

/// Writes resource records to a store and reports the result
pub struct SyncEmitter {
    store: Arc<dyn ResourceStore>,
    identity: SyncIdentity,
    metrics: SyncMetrics,
    logger: StructuredLogger,
}

impl SyncEmitter {
    pub fn new(store: Arc<dyn ResourceStore>, identity: SyncIdentity) -> Self {
        let logger = StructuredLogger::new(&identity.node_id);
        Self {
            store,
            identity,
            metrics: SyncMetrics::new(),
            logger,
        }
    }

    /// Sync records in order until done or until `shutdown` fires
    ///
    /// The shutdown signal is only observed between records; a write in
    /// flight always completes and is counted.
    pub async fn run(
        &self,
        records: Vec<PendingRecord>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> SyncReport {
        let total = records.len();
        let mut report = SyncReport::new(total);
        self.logger.log_sync_started(&self.identity.org_id, total);

        let mut records = records.into_iter();
        while let Some(pending) = records.next() {
            if shutdown_requested(&mut shutdown) {
                report.cancelled = true;
                let remaining = std::iter::once(pending).chain(records.by_ref());
                for skipped in remaining {
                    self.metrics.inc_outcome(RecordAction::Skipped.as_str());
                    report.record(RecordOutcome::bare(
                        skipped.index,
                        &skipped.name,
                        RecordAction::Skipped,
                    ));
                }
                self.logger
                    .log_sync_cancelled(report.success + report.errors, report.skipped);
                break;
            }

            let outcome = self.process(pending, total).await;
            self.metrics.inc_outcome(outcome.action.as_str());
            report.record(outcome);
        }

        self.logger
            .log_sync_completed(total, report.success, report.errors, report.skipped);

        match self.verify().await {
            Ok(summary) => report.verification = Some(summary),
            Err(e) => {
                self.logger.log_verification_failed(&e.to_string());
                report.verification_error = Some(e.to_string());
            }
        }

        report
    }

    async fn process(&self, pending: PendingRecord, total: usize) -> RecordOutcome {
        let position = pending.index + 1;

        let record = match pending.record {
            Ok(record) => record,
            Err(e) => {
                let message = e.to_string();
                self.logger
                    .log_record_rejected(position, total, &pending.name, &message);
                let mut outcome =
                    RecordOutcome::bare(pending.index, &pending.name, RecordAction::Rejected);
                outcome.error = Some(message);
                return outcome;
            }
        };

        let mut outcome = describe(pending.index, &record);
        match self.write(&record).await {
            Ok(result) => {
                outcome.action = match result {
                    UpsertOutcome::Inserted { .. } => RecordAction::Inserted,
                    UpsertOutcome::Updated { .. } => RecordAction::Updated,
                };
                outcome.store_id = Some(result.store_id().to_string());
                self.logger.log_record_synced(
                    position,
                    total,
                    &record.name,
                    result.action(),
                    record.resource_type.as_str(),
                    outcome.image.as_deref().unwrap_or_default(),
                    &summarize(&outcome.ports),
                    &summarize(&outcome.gpus),
                );
            }
            Err(e) => {
                let message = e.to_string();
                self.logger
                    .log_record_failed(position, total, &record.name, &message);
                outcome.action = RecordAction::Failed;
                outcome.error = Some(message);
            }
        }
        outcome
    }

    async fn write(&self, record: &ResourceRecord) -> Result<UpsertOutcome> {
        let start = Instant::now();
        let result = self.store.upsert(record).await;
        let elapsed = start.elapsed();
        self.metrics.observe_write_latency(elapsed.as_secs_f64());
        debug!(
            key = %record.key(),
            elapsed_ms = elapsed.as_millis() as u64,
            ok = result.is_ok(),
            "Store upsert finished"
        );
        result
    }

    /// Read the organization-wide counts from the store
    pub async fn verify(&self) -> Result<VerificationSummary> {
        let org_id = &self.identity.org_id;

        let total_resources = self.store.count_by_org(org_id).await?;
        let by_type = self.store.count_by_type(org_id).await?;

        let mut by_label = BTreeMap::new();
        for label in [LABEL_INFERENCE, LABEL_SYSTEM] {
            by_label.insert(
                label.to_string(),
                self.store.count_by_label(org_id, label).await?,
            );
        }

        for (resource_type, count) in gauge_counts(&by_type) {
            self.metrics.set_store_resources(resource_type, count);
        }

        Ok(VerificationSummary {
            total_resources,
            by_type,
            by_label,
        })
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) | Err(TryRecvError::Lagged(_)) => true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => false,
    }
}

/// Outcome pre-filled with the record's descriptive fields
fn describe(index: usize, record: &ResourceRecord) -> RecordOutcome {
    let mut outcome = RecordOutcome::bare(index, &record.name, RecordAction::Failed);
    outcome.resource_type = Some(record.resource_type);
    outcome.runtime_id = Some(record.runtime.id.clone());
    outcome.image = Some(format!(
        "{}:{}",
        record.config.image_name, record.config.image_tag
    ));
    outcome.ports = record
        .config
        .container_ports
        .iter()
        .map(|p| format!("{}:{}", p.container_port, p.host_port))
        .collect();
    outcome.gpus = record.runtime.allocated_gpu.clone();
    outcome
}

/// Gauge value per resource type; known types missing from `by_type` read 0
fn gauge_counts(by_type: &BTreeMap<String, u64>) -> BTreeMap<&str, u64> {
    let mut counts: BTreeMap<&str, u64> = ResourceType::ALL
        .iter()
        .map(|resource_type| (resource_type.as_str(), 0))
        .collect();
    for (resource_type, count) in by_type {
        counts.insert(resource_type.as_str(), *count);
    }
    counts
}

fn summarize(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
