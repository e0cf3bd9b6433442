//! GPU device extraction

use crate::models::DeviceRequest;

/// Flatten device ids across all device requests, in request order
pub fn extract_gpu_devices(requests: &[Option<DeviceRequest>]) -> Vec<String> {
    requests
        .iter()
        .flatten()
        .filter_map(|req| req.device_ids.as_ref())
        .flatten()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect()
}
