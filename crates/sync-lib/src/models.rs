//! Core data models for the resource sync pipeline
//!
//! Input types mirror the container runtime's inspect document (PascalCase
//! keys, every nested section optional). Output types mirror the resource
//! store document (camelCase keys, optional derived fields omitted).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label attached to inference workloads
pub const LABEL_INFERENCE: &str = "aio-inference";
/// Label attached to every other container
pub const LABEL_SYSTEM: &str = "aio-system";

/// Treat an explicit `null` the same as a missing field
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ---------------------------------------------------------------------------
// Input: container inspection records
// ---------------------------------------------------------------------------

/// One container inspection snapshot
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub config: ContainerConfig,
    #[serde(default, deserialize_with = "nullable")]
    pub host_config: HostConfig,
    #[serde(default, deserialize_with = "nullable")]
    pub state: ContainerState,
}

impl ContainerRecord {
    /// Container name without the runtime's leading `/`
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix('/').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    /// `"<port>/<proto>"` -> host bindings, in document order
    #[serde(default, deserialize_with = "nullable")]
    pub port_bindings: IndexMap<String, Option<Vec<HostBinding>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub binds: Vec<String>,
    #[serde(default)]
    pub network_mode: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub restart_policy: RestartPolicy,
    #[serde(default, deserialize_with = "nullable")]
    pub cpu_quota: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub cpu_period: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub memory: i64,
    #[serde(default, deserialize_with = "nullable")]
    pub device_requests: Vec<Option<DeviceRequest>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostBinding {
    #[serde(default)]
    pub host_port: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    #[serde(default)]
    pub name: Option<String>,
}

/// Hardware accelerator request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceRequest {
    #[serde(default, rename = "DeviceIDs")]
    pub device_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    #[serde(default)]
    pub started_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived sub-records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortBinding {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
    pub mode: String,
}

/// CPU and RAM limits; a field is `None` when the runtime sets no limit
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceLimits {
    pub cpu_cores: Option<f64>,
    pub ram_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

// ---------------------------------------------------------------------------
// Output: resource records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    InferenceContainer,
    ApplicationContainer,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [
        ResourceType::InferenceContainer,
        ResourceType::ApplicationContainer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::InferenceContainer => "inference-container",
            ResourceType::ApplicationContainer => "application-container",
        }
    }

    /// Metadata label that marks resources of this type
    pub fn label(&self) -> &'static str {
        match self {
            ResourceType::InferenceContainer => LABEL_INFERENCE,
            ResourceType::ApplicationContainer => LABEL_SYSTEM,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed external identifiers stamped onto every record of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncIdentity {
    pub org_id: String,
    pub user_id: String,
    pub node_id: String,
}

/// Store document describing one container as an organizational resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub name: String,
    pub description: String,
    pub resource_type: ResourceType,
    pub node_id: String,
    pub status: String,
    pub config: ResourceConfig,
    pub runtime: RuntimeInfo,
    pub last_health_check: DateTime<Utc>,
    pub error_message: Option<String>,
    pub metadata: ResourceMetadata,
    pub owner: Owner,
    pub created_by: String,
    pub updated_by: String,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    /// Reconciliation key of this record
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            node_id: self.node_id.clone(),
            runtime_id: self.runtime.id.clone(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.resource_type.label()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub registry: String,
    pub image_name: String,
    pub image_tag: String,
    pub container_ports: Vec<PortBinding>,
    pub volume_mounts: Vec<VolumeMount>,
    pub env_vars: IndexMap<String, String>,
    pub network_mode: String,
    pub restart_policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_repository: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gpu_device_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_limit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// Container id assigned by the runtime
    pub id: String,
    pub endpoint: String,
    #[serde(rename = "allocatedGPU", default, skip_serializing_if = "Vec::is_empty")]
    pub allocated_gpu: Vec<String>,
    #[serde(rename = "allocatedCPU", default, skip_serializing_if = "Option::is_none")]
    pub allocated_cpu: Option<f64>,
    #[serde(rename = "allocatedRAM", default, skip_serializing_if = "Option::is_none")]
    pub allocated_ram: Option<f64>,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "stoppedAt")]
    pub stopped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub user_id: String,
    pub org_id: String,
}

/// Identity used to match a record against the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub node_id: String,
    pub runtime_id: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.runtime_id)
    }
}
