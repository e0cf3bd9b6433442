//! Environment variable extraction

use indexmap::IndexMap;

/// Parse `KEY=VALUE` entries, splitting on the first `=` only
///
/// Entries without `=` are dropped; `=value` is kept under the empty key.
/// A repeated key keeps its first position and takes the last value.
pub fn extract_env(entries: &[String]) -> IndexMap<String, String> {
    entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
