//! Resource record assembly
//!
//! Combines classifier output, extracted fields and the run identity into
//! one store document per container.

use crate::classifier::Classifier;
use crate::error::{Result, SyncError};
use crate::extract::{self, ExtractedFields};
use crate::input::InputEntry;
use crate::models::{
    ContainerRecord, Owner, ResourceConfig, ResourceMetadata, ResourceRecord, RuntimeInfo,
    SyncIdentity,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Registry recorded for locally inspected images
pub const LOCAL_REGISTRY: &str = "local";

/// Status recorded for containers captured from a live snapshot
pub const RUNNING_STATUS: &str = "running";

/// A built record, or the reason the container was rejected
#[derive(Debug)]
pub struct PendingRecord {
    /// Position in the input sequence
    pub index: usize,
    /// Display name used in progress and failure reporting
    pub name: String,
    pub record: Result<ResourceRecord>,
}

pub struct ResourceBuilder {
    identity: SyncIdentity,
    classifier: Classifier,
}

impl ResourceBuilder {
    pub fn new(identity: SyncIdentity, classifier: Classifier) -> Self {
        Self {
            identity,
            classifier,
        }
    }

    pub fn identity(&self) -> &SyncIdentity {
        &self.identity
    }

    /// Build the resource record for one container
    ///
    /// `now` stamps `lastHealthCheck`, `createdAt` and `updatedAt`.
    pub fn build(&self, container: &ContainerRecord, now: DateTime<Utc>) -> Result<ResourceRecord> {
        let name = container.display_name();
        if name.trim().is_empty() {
            return Err(SyncError::malformed(&container.id, "container name is empty"));
        }
        if container.id.trim().is_empty() {
            return Err(SyncError::malformed(name, "container id is empty"));
        }

        let fields = extract::extract(container)?;
        Ok(self.assemble(container, fields, now))
    }

    fn assemble(
        &self,
        container: &ContainerRecord,
        fields: ExtractedFields,
        now: DateTime<Utc>,
    ) -> ResourceRecord {
        let name = container.display_name().to_string();
        let classification = self.classifier.classify(&name, &fields.image.name);

        let endpoint = fields
            .ports
            .first()
            .map(|p| format!("http://localhost:{}", p.host_port))
            .unwrap_or_default();

        let config = ResourceConfig {
            resource_type: classification.resource_type,
            registry: LOCAL_REGISTRY.to_string(),
            image_name: fields.image.name.clone(),
            image_tag: fields.image.tag.clone(),
            container_ports: fields.ports,
            volume_mounts: fields.volumes,
            env_vars: fields.env,
            network_mode: fields.network_mode,
            restart_policy: fields.restart_policy,
            inference_server: classification.inference_server,
            model_repository: classification.model_repository,
            gpu_device_ids: fields.gpu_devices.clone(),
            cpu_limit: fields.limits.cpu_cores,
            ram_limit: fields.limits.ram_gb,
        };

        let runtime = RuntimeInfo {
            id: container.id.clone(),
            endpoint,
            allocated_gpu: fields.gpu_devices,
            allocated_cpu: fields.limits.cpu_cores,
            allocated_ram: fields.limits.ram_gb,
            started_at: fields.started_at,
            stopped_at: None,
        };

        let mut labels = BTreeMap::new();
        labels.insert(classification.label.to_string(), "true".to_string());

        ResourceRecord {
            description: format!("Container: {}", fields.image),
            name,
            resource_type: classification.resource_type,
            node_id: self.identity.node_id.clone(),
            status: RUNNING_STATUS.to_string(),
            config,
            runtime,
            last_health_check: now,
            error_message: None,
            metadata: ResourceMetadata { labels },
            owner: Owner {
                user_id: self.identity.user_id.clone(),
                org_id: self.identity.org_id.clone(),
            },
            created_by: self.identity.user_id.clone(),
            updated_by: self.identity.user_id.clone(),
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build every decoded input entry, in input order
    ///
    /// Entries that failed to decode stay rejected. A runtime id that was
    /// already built earlier in the batch rejects the later record.
    pub fn prepare_all(&self, entries: Vec<InputEntry>, now: DateTime<Utc>) -> Vec<PendingRecord> {
        let mut seen = HashSet::new();

        entries
            .into_iter()
            .map(|entry| {
                let record = entry.container.and_then(|c| self.build(&c, now)).and_then(|r| {
                    if seen.insert(r.runtime.id.clone()) {
                        Ok(r)
                    } else {
                        Err(SyncError::malformed(
                            &entry.name,
                            format!("duplicate runtime id {} in input", r.runtime.id),
                        ))
                    }
                });

                if let Err(e) = &record {
                    debug!(index = entry.index, container = %entry.name, error = %e, "Rejected container record");
                }

                PendingRecord {
                    index: entry.index,
                    name: entry.name,
                    record,
                }
            })
            .collect()
    }
}
