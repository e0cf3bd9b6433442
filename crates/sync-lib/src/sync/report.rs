//! Sync run results

use crate::models::ResourceType;
use serde::Serialize;
use std::collections::BTreeMap;

/// What happened to one input record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordAction {
    Inserted,
    Updated,
    /// The store write failed
    Failed,
    /// The record was malformed and never reached the store
    Rejected,
    /// The run was interrupted before reaching the record
    Skipped,
}

impl RecordAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordAction::Inserted => "inserted",
            RecordAction::Updated => "updated",
            RecordAction::Failed => "failed",
            RecordAction::Rejected => "rejected",
            RecordAction::Skipped => "skipped",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecordAction::Inserted | RecordAction::Updated)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RecordAction::Failed | RecordAction::Rejected)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub index: usize,
    pub name: String,
    pub action: RecordAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// `containerPort:hostPort` pairs
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gpus: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordOutcome {
    pub(crate) fn bare(index: usize, name: &str, action: RecordAction) -> Self {
        Self {
            index,
            name: name.to_string(),
            action,
            resource_type: None,
            runtime_id: None,
            store_id: None,
            image: None,
            ports: Vec::new(),
            gpus: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub index: usize,
    pub name: String,
    pub message: String,
}

/// Point-in-time store counts for the organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub total_resources: u64,
    pub by_type: BTreeMap<String, u64>,
    pub by_label: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub total: usize,
    pub success: usize,
    pub errors: usize,
    pub skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub cancelled: bool,
    pub failures: Vec<SyncFailure>,
    pub outcomes: Vec<RecordOutcome>,
    pub verification: Option<VerificationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_error: Option<String>,
}

impl SyncReport {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, outcome: RecordOutcome) {
        match outcome.action {
            RecordAction::Inserted => {
                self.success += 1;
                self.inserted += 1;
            }
            RecordAction::Updated => {
                self.success += 1;
                self.updated += 1;
            }
            RecordAction::Failed | RecordAction::Rejected => {
                self.errors += 1;
                self.failures.push(SyncFailure {
                    index: outcome.index,
                    name: outcome.name.clone(),
                    message: outcome.error.clone().unwrap_or_default(),
                });
            }
            RecordAction::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }

    /// Every input record is accounted for exactly once
    pub fn is_consistent(&self) -> bool {
        self.success + self.errors + self.skipped == self.total
            && self.outcomes.len() == self.total
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}
