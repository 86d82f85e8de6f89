use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::cache::ModelCache;
use crate::config::ModelScoutConfig;
use crate::errors::Result;
use crate::events::ScoutEvent;
use crate::fingerprint::workflow_fingerprint;
use crate::hub::{HubClient, ModelLookup};
use crate::lookup::LookupPool;
use crate::scan::{dedupe_refs, scan_workflow};
use crate::types::{CacheSnapshot, ResolvedModel, Workflow, SELECT_SENTINEL};

/// Central engine that ties fingerprinting, scanning, lookups, and the
/// cache together behind [`ModelScout::invoke`].
///
/// The cache sits behind a mutex and the lookup pool owns a single worker,
/// so concurrent `invoke` calls serialize instead of interleaving partial
/// state.
pub struct ModelScout {
    config: ModelScoutConfig,
    node_id: String,
    cache: Mutex<ModelCache>,
    pool: LookupPool,
    events: broadcast::Sender<ScoutEvent>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

impl ModelScout {
    /// Creates an engine backed by the real model index client.
    pub fn new(config: ModelScoutConfig, node_id: &str) -> Result<ModelScout> {
        let lookup: Arc<dyn ModelLookup> = Arc::new(HubClient::new(&config.api_base_url));
        ModelScout::with_lookup(config, node_id, lookup)
    }

    /// Creates an engine around any lookup implementation. Tests use this
    /// to stand in for the index client.
    pub fn with_lookup(
        config: ModelScoutConfig,
        node_id: &str,
        lookup: Arc<dyn ModelLookup>,
    ) -> Result<ModelScout> {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let pool = LookupPool::new(lookup)?;

        Ok(ModelScout {
            config,
            node_id: node_id.to_string(),
            cache: Mutex::new(ModelCache::new()),
            pool,
            events,
        })
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScoutEvent> {
        self.events.subscribe()
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &ModelScoutConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

impl ModelScout {
    /// Resolves a workflow to a model triple.
    ///
    /// A full scan cycle runs when no explicit selection was made (absent,
    /// empty, or the selection placeholder) or when the workflow fingerprint
    /// changed since the last scan. Otherwise the selection is answered
    /// straight from the cache.
    pub fn invoke(&self, workflow: &Workflow, selection: Option<&str>) -> Result<ResolvedModel> {
        let fingerprint = workflow_fingerprint(workflow)?;
        let mut cache = self.cache.lock().expect("cache lock");

        let explicit = selection.filter(|s| !s.is_empty() && *s != SELECT_SENTINEL);
        let changed = cache.last_fingerprint() != Some(fingerprint.as_str());

        match explicit {
            Some(chosen) if !changed => cache.select(chosen),
            _ => self.rescan(&mut cache, workflow, &fingerprint),
        }
    }

    /// Runs one full cycle: scan, dedupe, look up, replace the cache, and
    /// notify subscribers. Returns the first resolved entry's triple, or
    /// the documented empty result when nothing resolved.
    fn rescan(
        &self,
        cache: &mut ModelCache,
        workflow: &Workflow,
        fingerprint: &str,
    ) -> Result<ResolvedModel> {
        let _ = self.events.send(ScoutEvent::ScanStarted {
            node_id: self.node_id.clone(),
        });

        let refs = dedupe_refs(scan_workflow(workflow))?;
        info!(
            "scan for node {} found {} unique references",
            self.node_id,
            refs.len()
        );

        let timeout = Duration::from_secs(self.config.lookup_timeout_secs);
        let outcome = self.pool.resolve_all(refs, timeout);
        if outcome.timed_out {
            let _ = self.events.send(ScoutEvent::LookupTimedOut {
                node_id: self.node_id.clone(),
            });
        }

        cache.rescan_replace(outcome.resolved, fingerprint);
        let models = cache.models().to_vec();
        info!(
            "scan for node {} resolved {} models",
            self.node_id,
            models.len()
        );

        let _ = self.events.send(ScoutEvent::ScanComplete {
            node_id: self.node_id.clone(),
            models: models.clone(),
        });

        match models.first() {
            Some(first) => cache.select(&first.filename),
            None => Ok(ResolvedModel::none()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cache access and persistence
// ---------------------------------------------------------------------------

impl ModelScout {
    /// Captures the cache as its persisted record.
    pub fn snapshot(&self) -> CacheSnapshot {
        self.cache.lock().expect("cache lock").snapshot()
    }

    /// Options for a selection widget, never empty.
    pub fn selection_options(&self) -> Vec<String> {
        self.cache.lock().expect("cache lock").selection_options()
    }

    /// Restores cache state persisted under `root`.
    ///
    /// On corrupt state the cache is left empty and the error is returned;
    /// the engine itself stays usable, so hosts can log and carry on.
    pub fn restore_state(&self, root: &Path) -> Result<()> {
        self.cache.lock().expect("cache lock").load_state(root)
    }

    /// Persists cache state under `root`.
    pub fn persist_state(&self, root: &Path) -> Result<()> {
        self.cache.lock().expect("cache lock").save_state(root)
    }
}
