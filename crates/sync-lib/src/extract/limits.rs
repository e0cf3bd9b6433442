//! CPU and memory limit extraction

use crate::models::{HostConfig, ResourceLimits};

/// CFS period assumed when the runtime reports none
pub const DEFAULT_CPU_PERIOD: i64 = 100_000;

pub const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Derive CPU cores and RAM (GiB) limits
///
/// A limit is present only when the source value is strictly positive and
/// stays non-zero after rounding.
pub fn extract_limits(host: &HostConfig) -> ResourceLimits {
    let period = if host.cpu_period > 0 {
        host.cpu_period
    } else {
        DEFAULT_CPU_PERIOD
    };

    let cpu_cores = (host.cpu_quota > 0)
        .then(|| round2(host.cpu_quota as f64 / period as f64))
        .filter(|v| *v > 0.0);

    let ram_gb = (host.memory > 0)
        .then(|| round2(host.memory as f64 / BYTES_PER_GIB))
        .filter(|v| *v > 0.0);

    ResourceLimits { cpu_cores, ram_gb }
}
