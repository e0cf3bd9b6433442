//! `normalize` command: print resource records without touching a store

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use sync_lib::{input, ResourceBuilder};

use super::load_classifier;
use crate::config::AppConfig;
use crate::output::{print_error, print_records, OutputFormat};

pub fn run_normalize(config: &AppConfig, input_path: &Path, format: OutputFormat) -> Result<()> {
    let classifier = load_classifier(config)?;
    let raw = input::read_inspection_file(input_path)
        .with_context(|| format!("Failed to load container snapshot {}", input_path.display()))?;

    let builder = ResourceBuilder::new(config.identity(), classifier);
    let pending = builder.prepare_all(input::decode_records(raw), Utc::now());

    let mut records = Vec::with_capacity(pending.len());
    for entry in pending {
        match entry.record {
            Ok(record) => records.push(record),
            Err(e) => print_error(&format!("[{}] {}: {}", entry.index + 1, entry.name, e)),
        }
    }

    print_records(&records, format)
}
