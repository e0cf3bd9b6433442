//! Resource Sync - container snapshot to resource store synchronizer
//!
//! Reads a `docker inspect` style JSON array, classifies each container,
//! and upserts one resource record per container into the resource store.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use sync_lib::StoreBackend;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, Overrides};

/// Resource Sync CLI
#[derive(Parser)]
#[command(name = "resource-sync")]
#[command(author, version, about = "Sync container inspection snapshots into the resource store", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Organization owning the resources
    #[arg(long, global = true)]
    pub org_id: Option<String>,

    /// User recorded as creator and updater
    #[arg(long, global = true)]
    pub user_id: Option<String>,

    /// Node the snapshot was taken on
    #[arg(long, global = true)]
    pub node_id: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Log format (logs are written to stderr)
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upsert every container of a snapshot into the resource store
    Sync {
        /// Inspection snapshot (JSON array)
        input: PathBuf,

        #[command(flatten)]
        store: StoreArgs,

        /// Classification table overriding the built-in one
        #[arg(long)]
        classification: Option<PathBuf>,

        /// Write Prometheus metrics to this file when done
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Print the resource records a snapshot maps to, without a store
    Normalize {
        /// Inspection snapshot (JSON array)
        input: PathBuf,

        /// Classification table overriding the built-in one
        #[arg(long)]
        classification: Option<PathBuf>,
    },

    /// Print resource counts for the organization
    Verify {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(clap::Args)]
pub struct StoreArgs {
    /// Store backend
    #[arg(long = "store")]
    pub backend: Option<StoreKind>,

    /// File for the `file` backend
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long)]
    pub mongo_uri: Option<String>,

    /// MongoDB database
    #[arg(long)]
    pub database: Option<String>,

    /// MongoDB collection
    #[arg(long)]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StoreKind {
    Memory,
    File,
    Mongo,
}

impl From<StoreKind> for StoreBackend {
    fn from(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Memory => StoreBackend::Memory,
            StoreKind::File => StoreBackend::File,
            StoreKind::Mongo => StoreBackend::Mongo,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

impl Cli {
    fn overrides(&self, store: Option<&StoreArgs>, classification: Option<&PathBuf>) -> Overrides {
        let mut overrides = Overrides {
            org_id: self.org_id.clone(),
            user_id: self.user_id.clone(),
            node_id: self.node_id.clone(),
            classification_path: classification.cloned(),
            ..Default::default()
        };
        if let Some(store) = store {
            overrides.backend = store.backend.map(StoreBackend::from);
            overrides.store_path = store.store_path.clone();
            overrides.mongo_uri = store.mongo_uri.clone();
            overrides.database = store.database.clone();
            overrides.collection = store.collection.clone();
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Sync {
            input,
            store,
            classification,
            metrics_file,
        } => {
            config.apply(cli.overrides(Some(store), classification.as_ref()));
            commands::sync::run_sync(&config, input, metrics_file.as_deref(), cli.format).await?;
        }
        Commands::Normalize {
            input,
            classification,
        } => {
            config.apply(cli.overrides(None, classification.as_ref()));
            commands::normalize::run_normalize(&config, input, cli.format)?;
        }
        Commands::Verify { store } => {
            config.apply(cli.overrides(Some(store), None));
            commands::verify::run_verify(&config, cli.format).await?;
        }
    }

    Ok(())
}
