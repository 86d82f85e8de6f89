use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::{ModelScoutError, Result};

/// `class_type` of the resolver's own nodes, excluded from fingerprints.
pub const RESOLVER_CLASS_TYPE: &str = "ModelScout";

/// Selection placeholder shown before any scan has run.
pub const SELECT_SENTINEL: &str = "Scan First";

/// Placeholder option offered when the cache holds no resolved models.
pub const NO_MODELS: &str = "No models found";

/// `repo_id` of the empty resolution result.
pub const NO_VALID_MODELS: &str = "No valid models found";

/// A model-file reference extracted from a workflow.
///
/// Identity is the `(filename, local_path)` pair. `repo_id` is absent until
/// the naming service resolves the file to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub filename: String,
    pub local_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_id: Option<String>,
}

impl ModelRef {
    /// Creates an unresolved reference.
    pub fn new(filename: &str, local_path: &str) -> ModelRef {
        ModelRef {
            filename: filename.to_string(),
            local_path: local_path.to_string(),
            repo_id: None,
        }
    }

    /// Returns true once the naming service has assigned a repository.
    pub fn is_resolved(&self) -> bool {
        self.repo_id.is_some()
    }

    /// Identity key used for deduplication and merging.
    pub fn identity(&self) -> (&str, &str) {
        (&self.filename, &self.local_path)
    }
}

/// A single node in a workflow graph.
///
/// Only `class_type` and `inputs` matter for resolution; any other fields
/// ride along untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    #[serde(default)]
    pub class_type: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A workflow graph keyed by node id.
///
/// The node map is a `BTreeMap` so serialization is key-ordered, which the
/// fingerprint depends on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Workflow {
    pub nodes: BTreeMap<String, WorkflowNode>,
}

impl Workflow {
    /// Parses a workflow from its JSON text form.
    pub fn parse(text: &str) -> Result<Workflow> {
        serde_json::from_str(text).map_err(|e| ModelScoutError::Parse {
            message: e.to_string(),
        })
    }

    /// Builds a workflow from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Workflow> {
        serde_json::from_value(value).map_err(|e| ModelScoutError::Parse {
            message: e.to_string(),
        })
    }
}

/// A match returned by the naming service: the repository that serves
/// `filename`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMatch {
    pub repo_id: String,
    pub filename: String,
}

/// The structured result of a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedModel {
    pub repo_id: String,
    pub filename: String,
    pub local_path: String,
}

impl ResolvedModel {
    /// The documented empty result, returned when a scan finds nothing usable.
    pub fn none() -> ResolvedModel {
        ResolvedModel {
            repo_id: NO_VALID_MODELS.to_string(),
            filename: String::new(),
            local_path: String::new(),
        }
    }
}

/// Persisted form of the resolution cache.
///
/// Field names are the wire contract. Readers must tolerate missing fields;
/// every field defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    #[serde(default)]
    pub known_artifacts: Vec<ModelRef>,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub last_fingerprint: Option<String>,
}
