//! Image reference and start timestamp parsing

use crate::models::ImageRef;
use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

const UNKNOWN_IMAGE: &str = "unknown";
const DEFAULT_TAG: &str = "latest";

/// Split an image reference into name and tag
///
/// A `:` inside the registry host (`registry:5000/app`) is not a tag
/// separator, and digests (`@sha256:...`) are dropped.
pub fn parse_image(reference: Option<&str>) -> ImageRef {
    let reference = match reference.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => {
            return ImageRef {
                name: UNKNOWN_IMAGE.to_string(),
                tag: DEFAULT_TAG.to_string(),
            }
        }
    };

    let reference = reference.split('@').next().unwrap_or(reference);
    let last_segment = reference.rfind('/').map(|i| i + 1).unwrap_or(0);

    match reference[last_segment..].rfind(':') {
        Some(pos) => {
            let split = last_segment + pos;
            let tag = &reference[split + 1..];
            ImageRef {
                name: reference[..split].to_string(),
                tag: if tag.is_empty() { DEFAULT_TAG } else { tag }.to_string(),
            }
        }
        None => ImageRef {
            name: reference.to_string(),
            tag: DEFAULT_TAG.to_string(),
        },
    }
}

/// Parse the runtime's RFC 3339 start timestamp
///
/// Returns `None` for empty values, unparseable values and the runtime's
/// zero time (`0001-01-01T00:00:00Z`, a container that never started).
pub fn parse_started_at(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) if ts.year() > 1 => Some(ts.with_timezone(&Utc)),
        Ok(_) => None,
        Err(e) => {
            debug!(value = %value, error = %e, "Ignoring unparseable start timestamp");
            None
        }
    }
}
