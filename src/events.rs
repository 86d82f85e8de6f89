use serde::{Deserialize, Serialize};

use crate::types::ModelRef;

/// Events pushed to subscribers as the engine works.
///
/// Sends are fire-and-forget; a missing subscriber never affects the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScoutEvent {
    /// A full scan cycle began for the named resolver node.
    ScanStarted { node_id: String },
    /// A full scan cycle finished; `models` is the refreshed resolved list.
    ScanComplete {
        node_id: String,
        models: Vec<ModelRef>,
    },
    /// The lookup batch hit its timeout ceiling and was abandoned.
    LookupTimedOut { node_id: String },
}
