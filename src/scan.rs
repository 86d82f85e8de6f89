use std::collections::HashSet;

use tracing::debug;

use crate::errors::{ModelScoutError, Result};
use crate::types::{ModelRef, Workflow};

/// Maps a bare filename's extension to the model directory it belongs in.
pub const EXTENSION_DIRS: &[(&str, &str)] = &[
    ("safetensors", "checkpoints"),
    ("ckpt", "checkpoints"),
    ("pt", "checkpoints"),
    ("bin", "checkpoints"),
    ("pth", "upscale_models"),
    ("onnx", "onnx"),
];

/// Extracts model-file references from every node's inputs.
///
/// String inputs with an embedded directory component split into
/// `(directory, filename)`; bare filenames are placed via [`EXTENSION_DIRS`].
/// Values without a usable extension, or bare names with an unmapped
/// extension, are skipped. Non-string inputs are skipped.
pub fn scan_workflow(workflow: &Workflow) -> Vec<ModelRef> {
    let mut refs = Vec::new();

    for node in workflow.nodes.values() {
        for value in node.inputs.values() {
            let Some(text) = value.as_str() else {
                continue;
            };
            let Some(reference) = extract_ref(text) else {
                continue;
            };
            debug!(
                "found model reference: {} (directory: {})",
                reference.filename, reference.local_path
            );
            refs.push(reference);
        }
    }

    debug!("workflow scan found {} model references", refs.len());
    refs
}

/// Turns one string input into a reference, or `None` if it does not look
/// like a model file.
fn extract_ref(text: &str) -> Option<ModelRef> {
    if let Some((dir, base)) = text.rsplit_once('/') {
        if dir.is_empty() || base.is_empty() || file_extension(base).is_none() {
            return None;
        }
        return Some(ModelRef::new(base, dir));
    }

    let ext = file_extension(text)?;
    let dir = EXTENSION_DIRS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, d)| *d)?;
    Some(ModelRef::new(text, dir))
}

/// Lowercased extension of `name`, or `None` when there is no usable one.
/// Dotfiles and trailing dots do not count as extensions.
fn file_extension(name: &str) -> Option<String> {
    let dot = name.rfind('.')?;
    if dot == 0 || dot + 1 == name.len() {
        return None;
    }
    Some(name[dot + 1..].to_ascii_lowercase())
}

/// Collapses references to a unique set keyed by `(filename, local_path)`,
/// preserving first-seen order. Entries with an empty filename or directory
/// are rejected.
pub fn dedupe_refs(refs: Vec<ModelRef>) -> Result<Vec<ModelRef>> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut unique = Vec::new();

    for reference in refs {
        if reference.filename.is_empty() || reference.local_path.is_empty() {
            return Err(ModelScoutError::Validation {
                message: format!(
                    "reference must have a filename and directory (got {:?}, {:?})",
                    reference.filename, reference.local_path
                ),
            });
        }
        let key = (reference.filename.clone(), reference.local_path.clone());
        if seen.insert(key) {
            unique.push(reference);
        }
    }

    Ok(unique)
}
