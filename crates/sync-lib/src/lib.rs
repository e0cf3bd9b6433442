//! Library for syncing container snapshots into a resource store
//!
//! This crate provides the core functionality for:
//! - Reading container inspection snapshots
//! - Classifying containers as inference or application workloads
//! - Extracting ports, volumes, env, GPUs and limits into resource records
//! - Idempotent upserts into an in-process or MongoDB store
//! - Sync reports, metrics and structured logging

pub mod builder;
pub mod classifier;
pub mod error;
pub mod extract;
pub mod input;
pub mod models;
pub mod observability;
pub mod store;
pub mod sync;

pub use builder::{PendingRecord, ResourceBuilder};
pub use classifier::{Classification, ClassificationTable, Classifier};
pub use error::{Result, SyncError};
pub use models::*;
pub use observability::{StructuredLogger, SyncMetrics};
pub use store::{ResourceStore, StoreBackend, StoreSettings};
pub use sync::{SyncEmitter, SyncPipeline, SyncReport, VerificationSummary};
