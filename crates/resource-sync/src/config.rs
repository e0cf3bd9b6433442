//! Configuration management for the sync binary
//!
//! Sources, lowest precedence first: built-in defaults, an optional config
//! file, `RESOURCE_SYNC_*` environment variables, then command-line flags.
//! Nested keys use `__` in the environment, e.g.
//! `RESOURCE_SYNC_STORE__BACKEND=mongo`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use sync_lib::{StoreBackend, StoreSettings, SyncIdentity};

pub const DEFAULT_ORG_ID: &str = "692ff5fa3371dad36b287ec5";
pub const DEFAULT_USER_ID: &str = "692ff5fa3371dad36b287ec4";
pub const DEFAULT_NODE_ID: &str = "6931711bd436a16167c4c5f1";

const ENV_PREFIX: &str = "RESOURCE_SYNC";

/// Resolved configuration for one invocation
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Organization owning the synced resources
    #[serde(default = "default_org_id")]
    pub org_id: String,

    /// User recorded as creator/updater
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Node the inspection snapshot was taken on
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Classification table overriding the built-in one
    #[serde(default)]
    pub classification_path: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreSettings,
}

fn default_org_id() -> String {
    DEFAULT_ORG_ID.to_string()
}

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_node_id() -> String {
    DEFAULT_NODE_ID.to_string()
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    pub node_id: Option<String>,
    pub classification_path: Option<PathBuf>,
    pub backend: Option<StoreBackend>,
    pub store_path: Option<PathBuf>,
    pub mongo_uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
}

impl AppConfig {
    /// Load configuration from the optional file and the environment
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Apply command-line values on top of the loaded configuration
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(org_id) = overrides.org_id {
            self.org_id = org_id;
        }
        if let Some(user_id) = overrides.user_id {
            self.user_id = user_id;
        }
        if let Some(node_id) = overrides.node_id {
            self.node_id = node_id;
        }
        if overrides.classification_path.is_some() {
            self.classification_path = overrides.classification_path;
        }
        if let Some(backend) = overrides.backend {
            self.store.backend = backend;
        }
        if overrides.store_path.is_some() {
            self.store.path = overrides.store_path;
        }
        if let Some(uri) = overrides.mongo_uri {
            self.store.uri = uri;
        }
        if let Some(database) = overrides.database {
            self.store.database = database;
        }
        if let Some(collection) = overrides.collection {
            self.store.collection = collection;
        }
    }

    pub fn identity(&self) -> SyncIdentity {
        SyncIdentity {
            org_id: self.org_id.clone(),
            user_id: self.user_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}
