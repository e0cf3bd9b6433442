//! Container classification
//!
//! Maps a container name (and image) to a resource type, a metadata label
//! and, for inference workloads, the serving stack and model repository.
//! The lookup tables are data, loaded from JSON.

use crate::error::{Result, SyncError};
use crate::models::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Image-name marker for vLLM based serving images
const VLLM_MARKER: &str = "vllm";

const BUILTIN_TABLE: &str = include_str!("../data/classification.json");

fn default_fallback_server() -> String {
    "triton".to_string()
}

/// Lookup tables driving the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationTable {
    /// Container names that run model inference
    pub inference_containers: BTreeSet<String>,
    /// Container name -> model repository identifier
    #[serde(default)]
    pub model_repositories: BTreeMap<String, String>,
    /// Inference server assumed when the image is not a vLLM image
    #[serde(default = "default_fallback_server")]
    pub fallback_inference_server: String,
}

impl Default for ClassificationTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassificationTable {
    /// Table shipped with the crate
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_TABLE).expect("Built-in classification table is valid JSON")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SyncError::Classification(e.to_string()))
    }

    /// Load a table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Classification(format!("failed to read {}: {}", path.display(), e))
        })?;
        let table = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            inference_containers = table.inference_containers.len(),
            model_repositories = table.model_repositories.len(),
            "Loaded classification table"
        );
        Ok(table)
    }
}

/// Classification of a single container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub resource_type: ResourceType,
    pub label: &'static str,
    /// Only set for inference containers
    pub inference_server: Option<String>,
    /// Only set for inference containers with a known model
    pub model_repository: Option<String>,
}

impl Classification {
    pub fn is_inference(&self) -> bool {
        self.resource_type == ResourceType::InferenceContainer
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    table: ClassificationTable,
}

impl Classifier {
    pub fn new(table: ClassificationTable) -> Self {
        Self { table }
    }

    /// Classify a container by display name and image name
    pub fn classify(&self, name: &str, image_name: &str) -> Classification {
        if !self.table.inference_containers.contains(name) {
            return Classification {
                resource_type: ResourceType::ApplicationContainer,
                label: ResourceType::ApplicationContainer.label(),
                inference_server: None,
                model_repository: None,
            };
        }

        let inference_server = if image_name.contains(VLLM_MARKER) {
            VLLM_MARKER.to_string()
        } else {
            self.table.fallback_inference_server.clone()
        };

        Classification {
            resource_type: ResourceType::InferenceContainer,
            label: ResourceType::InferenceContainer.label(),
            inference_server: Some(inference_server),
            model_repository: self.table.model_repositories.get(name).cloned(),
        }
    }
}
