use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::errors::Result;
use crate::types::{Workflow, WorkflowNode, RESOLVER_CLASS_TYPE};

/// Computes the stable fingerprint of a workflow.
///
/// Nodes whose `class_type` is [`RESOLVER_CLASS_TYPE`] are excluded, so the
/// resolver's own presence and mutable selection state never perturb the
/// digest. The surviving nodes serialize with sorted keys at every level,
/// making the fingerprint independent of the key order of the source text.
pub fn workflow_fingerprint(workflow: &Workflow) -> Result<String> {
    let filtered: BTreeMap<&String, &WorkflowNode> = workflow
        .nodes
        .iter()
        .filter(|(_, node)| node.class_type != RESOLVER_CLASS_TYPE)
        .collect();
    let canonical = serde_json::to_string(&filtered)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Parses workflow text and fingerprints it in one step.
pub fn fingerprint_text(text: &str) -> Result<String> {
    let workflow = Workflow::parse(text)?;
    workflow_fingerprint(&workflow)
}
