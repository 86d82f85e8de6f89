use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use tokio::runtime::Builder;
use tracing::{debug, error, warn};

use crate::errors::Result;
use crate::hub::ModelLookup;
use crate::types::ModelRef;

/// Result of one lookup batch.
#[derive(Debug, Clone, Default)]
pub struct LookupOutcome {
    /// References that resolved, in input order, with `repo_id` filled in.
    pub resolved: Vec<ModelRef>,
    /// True when the batch hit the timeout ceiling and was abandoned.
    pub timed_out: bool,
}

struct LookupJob {
    refs: Vec<ModelRef>,
    cancel: Arc<AtomicBool>,
    reply: Sender<Vec<ModelRef>>,
}

/// Runs naming-service lookups on a dedicated worker thread.
///
/// The worker owns its own single-threaded async runtime, so lookups never
/// assume anything about the caller's execution context. Callers wait on a
/// batch with a bounded timeout; an expired batch degrades to an empty
/// outcome while the worker finishes in the background.
pub struct LookupPool {
    jobs: Sender<LookupJob>,
}

impl LookupPool {
    /// Spawns the worker thread around a lookup implementation.
    pub fn new(lookup: Arc<dyn ModelLookup>) -> Result<LookupPool> {
        let (jobs, queue) = unbounded::<LookupJob>();
        thread::Builder::new()
            .name("modelscout-lookup".to_string())
            .spawn(move || worker_loop(queue, lookup))?;
        Ok(LookupPool { jobs })
    }

    /// Resolves a batch of references, waiting at most `timeout`.
    ///
    /// Returns only the references that resolved, in input order. A timeout
    /// or a dead worker degrades to an empty outcome; per-reference failures
    /// are logged by the worker and skipped. This call never fails the
    /// engine.
    pub fn resolve_all(&self, refs: Vec<ModelRef>, timeout: Duration) -> LookupOutcome {
        if refs.is_empty() {
            return LookupOutcome::default();
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (reply, done) = bounded(1);
        let job = LookupJob {
            refs,
            cancel: cancel.clone(),
            reply,
        };
        if self.jobs.send(job).is_err() {
            warn!("lookup worker is gone, resolving nothing");
            return LookupOutcome::default();
        }

        match done.recv_timeout(timeout) {
            Ok(resolved) => LookupOutcome {
                resolved,
                timed_out: false,
            },
            Err(RecvTimeoutError::Timeout) => {
                cancel.store(true, Ordering::Relaxed);
                warn!(
                    "lookup batch exceeded {:?}, abandoning it and resolving nothing",
                    timeout
                );
                LookupOutcome {
                    resolved: Vec::new(),
                    timed_out: true,
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("lookup worker dropped the batch, resolving nothing");
                LookupOutcome::default()
            }
        }
    }
}

fn worker_loop(queue: Receiver<LookupJob>, lookup: Arc<dyn ModelLookup>) {
    let runtime = match Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("failed to build lookup runtime: {}", e);
            return;
        }
    };

    while let Ok(job) = queue.recv() {
        let resolved = runtime.block_on(resolve_batch(lookup.as_ref(), job.refs, &job.cancel));
        // The receiver may be gone when the batch outlived its timeout.
        let _ = job.reply.send(resolved);
    }
}

async fn resolve_batch(
    lookup: &dyn ModelLookup,
    refs: Vec<ModelRef>,
    cancel: &AtomicBool,
) -> Vec<ModelRef> {
    let mut resolved = Vec::new();

    for mut reference in refs {
        if cancel.load(Ordering::Relaxed) {
            debug!(
                "lookup batch cancelled, discarding {} resolutions",
                resolved.len()
            );
            return resolved;
        }
        match lookup.lookup(&reference.filename).await {
            Ok(Some(found)) => {
                debug!("{} resolved to {}", reference.filename, found.repo_id);
                reference.repo_id = Some(found.repo_id);
                resolved.push(reference);
            }
            Ok(None) => debug!("{} not found in the model index", reference.filename),
            Err(e) => warn!("lookup failed for {}: {}", reference.filename, e),
        }
    }

    resolved
}
