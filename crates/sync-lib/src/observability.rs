//! Observability infrastructure for the sync pipeline
//!
//! Provides:
//! - Prometheus metrics (per-record outcomes, store write latency, verified resource counts)
//! - Structured logging of sync events with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge_vec, Encoder, Histogram,
    IntCounterVec, IntGaugeVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for store write latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<SyncMetricsInner> = OnceLock::new();

struct SyncMetricsInner {
    records_total: IntCounterVec,
    write_latency_seconds: Histogram,
    store_resources: IntGaugeVec,
}

impl SyncMetricsInner {
    fn new() -> Self {
        Self {
            records_total: register_int_counter_vec!(
                "resource_sync_records_total",
                "Container records processed, by outcome",
                &["outcome"]
            )
            .expect("Failed to register records_total"),

            write_latency_seconds: register_histogram!(
                "resource_sync_write_latency_seconds",
                "Time spent writing one resource to the store",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register write_latency_seconds"),

            store_resources: register_int_gauge_vec!(
                "resource_sync_store_resources",
                "Resources of the organization in the store after the last sync, by type",
                &["resource_type"]
            )
            .expect("Failed to register store_resources"),
        }
    }
}

/// Handle to the process-wide sync metrics
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct SyncMetrics {
    _private: (),
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SyncMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SyncMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Count one record outcome (`inserted`, `updated`, `failed`, `rejected`, `skipped`)
    pub fn inc_outcome(&self, outcome: &str) {
        self.inner()
            .records_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.inner()
            .records_total
            .with_label_values(&[outcome])
            .get()
    }

    pub fn observe_write_latency(&self, duration_secs: f64) {
        self.inner().write_latency_seconds.observe(duration_secs);
    }

    pub fn set_store_resources(&self, resource_type: &str, count: u64) {
        self.inner()
            .store_resources
            .with_label_values(&[resource_type])
            .set(count as i64);
    }

    pub fn store_resources(&self, resource_type: &str) -> i64 {
        self.inner()
            .store_resources
            .with_label_values(&[resource_type])
            .get()
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Structured logger for sync events
#[derive(Clone)]
pub struct StructuredLogger {
    node_id: String,
}

impl StructuredLogger {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }

    pub fn log_sync_started(&self, org_id: &str, total: usize) {
        info!(
            event = "sync_started",
            node = %self.node_id,
            org = %org_id,
            total = total,
            "Syncing containers to resources"
        );
    }

    /// Log a record that reached the store
    pub fn log_record_synced(
        &self,
        position: usize,
        total: usize,
        name: &str,
        action: &str,
        resource_type: &str,
        image: &str,
        ports: &str,
        gpus: &str,
    ) {
        info!(
            event = "record_synced",
            node = %self.node_id,
            position = position,
            total = total,
            container = %name,
            action = %action,
            resource_type = %resource_type,
            image = %image,
            ports = %ports,
            gpus = %gpus,
            "Resource {}", action
        );
    }

    pub fn log_record_failed(&self, position: usize, total: usize, name: &str, error: &str) {
        warn!(
            event = "record_failed",
            node = %self.node_id,
            position = position,
            total = total,
            container = %name,
            error = %error,
            "Failed to write resource"
        );
    }

    pub fn log_record_rejected(&self, position: usize, total: usize, name: &str, error: &str) {
        warn!(
            event = "record_rejected",
            node = %self.node_id,
            position = position,
            total = total,
            container = %name,
            error = %error,
            "Skipped malformed container record"
        );
    }

    pub fn log_sync_cancelled(&self, processed: usize, remaining: usize) {
        warn!(
            event = "sync_cancelled",
            node = %self.node_id,
            processed = processed,
            remaining = remaining,
            "Sync interrupted, remaining records left for the next run"
        );
    }

    pub fn log_sync_completed(&self, total: usize, success: usize, errors: usize, skipped: usize) {
        info!(
            event = "sync_completed",
            node = %self.node_id,
            total = total,
            success = success,
            errors = errors,
            skipped = skipped,
            "Sync complete"
        );
    }

    pub fn log_verification_failed(&self, error: &str) {
        warn!(
            event = "verification_failed",
            node = %self.node_id,
            error = %error,
            "Post-sync verification failed"
        );
    }
}
