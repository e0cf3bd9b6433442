//! `sync` command: upsert a snapshot into the resource store

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use sync_lib::{input, store, SyncMetrics, SyncPipeline};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::load_classifier;
use crate::config::AppConfig;
use crate::output::{print_info, print_report, print_success, OutputFormat};

pub async fn run_sync(
    config: &AppConfig,
    input_path: &Path,
    metrics_file: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let classifier = load_classifier(config)?;
    let records = input::read_inspection_file(input_path)
        .with_context(|| format!("Failed to load container snapshot {}", input_path.display()))?;

    let store = store::connect(&config.store)
        .await
        .context("Failed to open resource store")?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current record");
            let _ = shutdown_tx.send(());
        }
    });

    info!(
        org = %config.org_id,
        node = %config.node_id,
        backend = ?config.store.backend,
        records = records.len(),
        "Starting sync"
    );

    let pipeline = SyncPipeline::new(config.identity(), classifier, store);
    let report = pipeline.run(records, Utc::now(), shutdown_rx).await;

    print_report(&report, format)?;

    if let Some(path) = metrics_file {
        let text = SyncMetrics::new()
            .render_text()
            .context("Failed to encode metrics")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        if let OutputFormat::Table = format {
            print_info(&format!("Metrics written to {}", path.display()));
        }
    }

    if let OutputFormat::Table = format {
        if !report.has_errors() && !report.cancelled {
            print_success(&format!("Synced {} container(s)", report.success));
        }
    }

    Ok(())
}
