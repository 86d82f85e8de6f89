use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::{get_modelscout_dir, get_state_path};
use crate::errors::{ModelScoutError, Result};
use crate::types::{CacheSnapshot, ModelRef, ResolvedModel, NO_MODELS, SELECT_SENTINEL};

/// In-memory resolution cache.
///
/// Holds every model reference the engine knows about, the fingerprint of
/// the workflow that produced them, and whether a full scan cycle has
/// completed yet. Entries are unique by `(filename, local_path)` and keep
/// their insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCache {
    models: Vec<ModelRef>,
    initialized: bool,
    last_fingerprint: Option<String>,
}

impl ModelCache {
    /// Creates an empty cache.
    pub fn new() -> ModelCache {
        ModelCache::default()
    }

    /// Known references, resolved and unresolved, in insertion order.
    pub fn models(&self) -> &[ModelRef] {
        &self.models
    }

    /// True once a full scan cycle has completed or a snapshot said so.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Fingerprint of the workflow behind the current entries.
    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Merges lookup results into the cache.
    ///
    /// An incoming reference that shares identity with an existing entry
    /// updates that entry's `repo_id` in place; anything else is appended.
    /// Merge never deletes. Only a full rescan replaces the list.
    pub fn merge(&mut self, incoming: Vec<ModelRef>) {
        for reference in incoming {
            match self
                .models
                .iter_mut()
                .find(|m| m.identity() == reference.identity())
            {
                Some(existing) => existing.repo_id = reference.repo_id,
                None => self.models.push(reference),
            }
        }
    }

    /// Replaces the cache wholesale after a full rescan and records the
    /// fingerprint it was produced from. Completing a cycle, even an empty
    /// one, marks the cache initialized.
    pub fn rescan_replace(&mut self, models: Vec<ModelRef>, fingerprint: &str) {
        self.models = models;
        self.last_fingerprint = Some(fingerprint.to_string());
        self.initialized = true;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// First entry matching `filename`, if any.
    pub fn query_by_filename(&self, filename: &str) -> Option<&ModelRef> {
        self.models.iter().find(|m| m.filename == filename)
    }

    /// Filenames of resolved entries, in cache order.
    pub fn resolved_filenames(&self) -> Vec<String> {
        self.models
            .iter()
            .filter(|m| m.is_resolved())
            .map(|m| m.filename.clone())
            .collect()
    }

    /// Options for a selection widget. Substitutes the documented sentinel
    /// when nothing resolved, so the list is never empty.
    pub fn selection_options(&self) -> Vec<String> {
        let filenames = self.resolved_filenames();
        if filenames.is_empty() {
            vec![NO_MODELS.to_string()]
        } else {
            filenames
        }
    }

    /// Resolves an explicit selection to its triple.
    ///
    /// The selection placeholder is rejected as a validation error, an
    /// unknown filename as not-found, and a known-but-unresolved entry as
    /// unresolved. This is a side-effect-free read.
    pub fn select(&self, filename: &str) -> Result<ResolvedModel> {
        if filename == SELECT_SENTINEL {
            return Err(ModelScoutError::Validation {
                message: "no selection made".to_string(),
            });
        }

        let entry = self
            .query_by_filename(filename)
            .ok_or_else(|| ModelScoutError::NotFound {
                filename: filename.to_string(),
            })?;

        let repo_id = entry
            .repo_id
            .clone()
            .ok_or_else(|| ModelScoutError::Unresolved {
                filename: filename.to_string(),
            })?;

        Ok(ResolvedModel {
            repo_id,
            filename: entry.filename.clone(),
            local_path: entry.local_path.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Captures the cache as its persisted record.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            known_artifacts: self.models.clone(),
            initialized: self.initialized,
            last_fingerprint: self.last_fingerprint.clone(),
        }
    }

    /// Restores the cache from a persisted record.
    ///
    /// Missing fields default to empty/false/absent, so snapshots from older
    /// schema versions load fine. Structurally invalid input resets the
    /// cache to empty and reports a deserialization error.
    pub fn restore(&mut self, value: Value) -> Result<()> {
        match serde_json::from_value::<CacheSnapshot>(value) {
            Ok(snapshot) => {
                self.models = snapshot.known_artifacts;
                self.initialized = snapshot.initialized;
                self.last_fingerprint = snapshot.last_fingerprint;
                Ok(())
            }
            Err(e) => {
                *self = ModelCache::default();
                Err(ModelScoutError::Deserialization {
                    message: format!("invalid cache snapshot: {}", e),
                })
            }
        }
    }

    /// Loads the cache from the state file under `root`, if one exists.
    ///
    /// A missing state file leaves the cache untouched. An unparsable one
    /// behaves like [`ModelCache::restore`] on invalid input.
    pub fn load_state(&mut self, root: &Path) -> Result<()> {
        let state_path = get_state_path(root);
        if !state_path.exists() {
            debug!("no state file at {}, starting empty", state_path.display());
            return Ok(());
        }

        let contents = fs::read_to_string(&state_path)?;
        let value: Value = match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(e) => {
                *self = ModelCache::default();
                return Err(ModelScoutError::Deserialization {
                    message: format!("invalid state file '{}': {}", state_path.display(), e),
                });
            }
        };

        self.restore(value)
    }

    /// Writes the cache to the state file under `root` using an atomic
    /// write, the same tmp-then-rename dance as the config file.
    pub fn save_state(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(get_modelscout_dir(root))?;

        let state_path = get_state_path(root);
        let tmp_path = state_path.with_extension("tmp");

        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(&tmp_path, &json)?;
        fs::rename(&tmp_path, &state_path)?;

        Ok(())
    }
}
