//! Port binding extraction

use crate::error::{Result, SyncError};
use crate::models::{HostConfig, PortBinding};

const DEFAULT_PROTOCOL: &str = "tcp";

/// Flatten `PortBindings` into one entry per host binding
///
/// Keys have the form `<port>/<proto>`. A key whose binding list is null or
/// empty is exposed but unpublished and yields nothing. A binding without a
/// host port publishes on the container port.
pub fn extract_ports(container_name: &str, host: &HostConfig) -> Result<Vec<PortBinding>> {
    let mut ports = Vec::new();

    for (spec, bindings) in &host.port_bindings {
        let bindings = match bindings {
            Some(b) if !b.is_empty() => b,
            _ => continue,
        };

        let (port, protocol) = spec.split_once('/').unwrap_or((spec.as_str(), DEFAULT_PROTOCOL));
        let container_port = parse_port(container_name, port)?;
        let protocol = if protocol.is_empty() {
            DEFAULT_PROTOCOL.to_string()
        } else {
            protocol.to_ascii_lowercase()
        };

        for binding in bindings {
            let host_port = match binding.host_port.as_deref().map(str::trim) {
                Some(p) if !p.is_empty() => parse_port(container_name, p)?,
                _ => container_port,
            };

            ports.push(PortBinding {
                container_port,
                host_port,
                protocol: protocol.clone(),
            });
        }
    }

    Ok(ports)
}

fn parse_port(container_name: &str, value: &str) -> Result<u16> {
    value.trim().parse().map_err(|_| SyncError::InvalidPort {
        name: container_name.to_string(),
        value: value.to_string(),
    })
}
