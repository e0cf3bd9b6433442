//! Field extraction from container inspection records
//!
//! Decomposes the nested runtime configuration into normalized
//! sub-records: port bindings, volume mounts, environment variables,
//! GPU device allocations and CPU/RAM limits. Missing sections are
//! treated as empty; only unparseable port numbers are reported.

mod devices;
mod env;
mod image;
mod limits;
mod ports;
mod volumes;


pub use devices::extract_gpu_devices;
pub use env::extract_env;
pub use image::{parse_image, parse_started_at};
pub use limits::{extract_limits, round2, BYTES_PER_GIB, DEFAULT_CPU_PERIOD};
pub use ports::extract_ports;
pub use volumes::extract_volumes;

use crate::error::Result;
use crate::models::{ContainerRecord, ImageRef, PortBinding, ResourceLimits, VolumeMount};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;

/// Network mode recorded when the runtime reports none
pub const DEFAULT_NETWORK_MODE: &str = "bridge";

/// Restart policy recorded when the runtime reports none
pub const DEFAULT_RESTART_POLICY: &str = "unless-stopped";

/// Everything the builder needs from one container record
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub image: ImageRef,
    pub ports: Vec<PortBinding>,
    pub volumes: Vec<VolumeMount>,
    pub env: IndexMap<String, String>,
    pub gpu_devices: Vec<String>,
    pub limits: ResourceLimits,
    pub network_mode: String,
    pub restart_policy: String,
    pub started_at: Option<DateTime<Utc>>,
}

/// Extract all derived fields from a container record
pub fn extract(container: &ContainerRecord) -> Result<ExtractedFields> {
    let name = container.display_name();
    let host = &container.host_config;

    Ok(ExtractedFields {
        image: parse_image(container.config.image.as_deref()),
        ports: extract_ports(name, host)?,
        volumes: extract_volumes(&host.binds),
        env: extract_env(&container.config.env),
        gpu_devices: extract_gpu_devices(&host.device_requests),
        limits: extract_limits(host),
        network_mode: non_empty_or(host.network_mode.as_deref(), DEFAULT_NETWORK_MODE),
        restart_policy: non_empty_or(
            host.restart_policy.name.as_deref(),
            DEFAULT_RESTART_POLICY,
        ),
        started_at: container
            .state
            .started_at
            .as_deref()
            .and_then(parse_started_at),
    })
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}
