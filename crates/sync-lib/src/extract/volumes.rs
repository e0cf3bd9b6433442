//! Bind mount extraction

use crate::models::VolumeMount;

const DEFAULT_MODE: &str = "rw";

/// Parse `host[:container[:mode]]` bind specifications
pub fn extract_volumes(binds: &[String]) -> Vec<VolumeMount> {
    binds
        .iter()
        .filter(|b| !b.trim().is_empty())
        .map(|bind| {
            let mut parts = bind.split(':');
            let host_path = parts.next().unwrap_or_default();
            let container_path = parts.next().unwrap_or(host_path);
            let mode = parts.next().unwrap_or(DEFAULT_MODE);

            VolumeMount {
                host_path: host_path.to_string(),
                container_path: container_path.to_string(),
                mode: mode.to_string(),
            }
        })
        .collect()
}
