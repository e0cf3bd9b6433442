//! `verify` command: report store counts for the configured organization

use anyhow::{Context, Result};
use sync_lib::{store, SyncEmitter};

use crate::config::AppConfig;
use crate::output::{print_verification, OutputFormat};

pub async fn run_verify(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let store = store::connect(&config.store)
        .await
        .context("Failed to open resource store")?;

    let summary = SyncEmitter::new(store, config.identity())
        .verify()
        .await
        .context("Failed to read resource counts")?;

    print_verification(&summary, format)
}
