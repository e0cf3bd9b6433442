//! Command implementations

pub mod normalize;
pub mod sync;
pub mod verify;

use anyhow::{Context, Result};
use sync_lib::{ClassificationTable, Classifier};

use crate::config::AppConfig;

/// Build the classifier from the configured table, or the built-in one
pub fn load_classifier(config: &AppConfig) -> Result<Classifier> {
    let table = match &config.classification_path {
        Some(path) => ClassificationTable::load(path)
            .with_context(|| format!("Failed to load classification table {}", path.display()))?,
        None => ClassificationTable::builtin(),
    };
    Ok(Classifier::new(table))
}
