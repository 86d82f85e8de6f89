use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use modelscout::errors::{ModelScoutError, Result};
use modelscout::hub::ModelLookup;
use modelscout::lookup::LookupPool;
use modelscout::types::{ModelRef, RepoMatch};

/// Lookup backed by a fixed filename-to-repository table.
struct MapLookup {
    repos: HashMap<String, String>,
}

impl MapLookup {
    fn new(entries: &[(&str, &str)]) -> MapLookup {
        MapLookup {
            repos: entries
                .iter()
                .map(|(file, repo)| (file.to_string(), repo.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ModelLookup for MapLookup {
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>> {
        Ok(self.repos.get(filename).map(|repo_id| RepoMatch {
            repo_id: repo_id.clone(),
            filename: filename.to_string(),
        }))
    }
}

/// Lookup that errors on one filename and resolves everything else.
struct FlakyLookup {
    poison: String,
}

#[async_trait]
impl ModelLookup for FlakyLookup {
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>> {
        if filename == self.poison {
            return Err(ModelScoutError::Lookup {
                message: format!("index refused {}", filename),
            });
        }
        Ok(Some(RepoMatch {
            repo_id: format!("org/{}", filename),
            filename: filename.to_string(),
        }))
    }
}

/// Lookup that sleeps before answering and counts how often it was called.
struct SlowLookup {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelLookup for SlowLookup {
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Some(RepoMatch {
            repo_id: format!("org/{}", filename),
            filename: filename.to_string(),
        }))
    }
}

/// Lookup whose first call is slow and whose later calls are instant.
struct SlowOnceLookup {
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelLookup for SlowOnceLookup {
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Some(RepoMatch {
            repo_id: format!("org/{}", filename),
            filename: filename.to_string(),
        }))
    }
}

fn refs(names: &[(&str, &str)]) -> Vec<ModelRef> {
    names
        .iter()
        .map(|(file, dir)| ModelRef::new(file, dir))
        .collect()
}

#[test]
fn test_resolves_references_in_input_order() {
    let lookup = MapLookup::new(&[
        ("c.ckpt", "org/c"),
        ("a.safetensors", "org/a"),
        ("b.pth", "org/b"),
    ]);
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let outcome = pool.resolve_all(
        refs(&[
            ("c.ckpt", "checkpoints"),
            ("a.safetensors", "checkpoints"),
            ("b.pth", "upscale_models"),
        ]),
        Duration::from_secs(5),
    );

    assert!(!outcome.timed_out);
    let names: Vec<&str> = outcome.resolved.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(
        names,
        vec!["c.ckpt", "a.safetensors", "b.pth"],
        "results must come back in input order, not alphabetical"
    );
    assert_eq!(outcome.resolved[0].repo_id.as_deref(), Some("org/c"));
    assert_eq!(
        outcome.resolved[2].local_path, "upscale_models",
        "the directory must survive resolution untouched"
    );
}

#[test]
fn test_unknown_references_are_skipped() {
    let lookup = MapLookup::new(&[("known.ckpt", "org/known")]);
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let outcome = pool.resolve_all(
        refs(&[("known.ckpt", "checkpoints"), ("mystery.ckpt", "checkpoints")]),
        Duration::from_secs(5),
    );

    assert_eq!(outcome.resolved.len(), 1);
    assert_eq!(outcome.resolved[0].filename, "known.ckpt");
}

#[test]
fn test_one_failing_reference_does_not_sink_the_batch() {
    let lookup = FlakyLookup {
        poison: "b.pth".to_string(),
    };
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let outcome = pool.resolve_all(
        refs(&[
            ("a.safetensors", "checkpoints"),
            ("b.pth", "upscale_models"),
            ("c.ckpt", "checkpoints"),
        ]),
        Duration::from_secs(5),
    );

    assert!(!outcome.timed_out);
    let names: Vec<&str> = outcome.resolved.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(
        names,
        vec!["a.safetensors", "c.ckpt"],
        "the poisoned reference is skipped, its neighbors still resolve"
    );
}

#[test]
fn test_empty_batch_returns_immediately() {
    let pool = LookupPool::new(Arc::new(MapLookup::new(&[])))
        .expect("failed to start lookup pool");

    let start = Instant::now();
    let outcome = pool.resolve_all(Vec::new(), Duration::from_secs(30));

    assert!(outcome.resolved.is_empty());
    assert!(!outcome.timed_out);
    assert!(
        start.elapsed() < Duration::from_secs(1),
        "an empty batch must not wait on the worker at all"
    );
}

#[test]
fn test_timeout_degrades_to_empty_outcome() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = SlowLookup {
        delay: Duration::from_millis(300),
        calls: calls.clone(),
    };
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let start = Instant::now();
    let outcome = pool.resolve_all(
        refs(&[("slow.ckpt", "checkpoints")]),
        Duration::from_millis(50),
    );

    assert!(outcome.timed_out, "the batch should report its timeout");
    assert!(
        outcome.resolved.is_empty(),
        "a timed-out batch resolves nothing"
    );
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "the caller must get its answer near the deadline, not the batch length"
    );
}

#[test]
fn test_abandoned_batch_stops_after_the_reference_in_flight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = SlowLookup {
        delay: Duration::from_millis(200),
        calls: calls.clone(),
    };
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let outcome = pool.resolve_all(
        refs(&[
            ("a.ckpt", "checkpoints"),
            ("b.ckpt", "checkpoints"),
            ("c.ckpt", "checkpoints"),
            ("d.ckpt", "checkpoints"),
        ]),
        Duration::from_millis(100),
    );
    assert!(outcome.timed_out);

    // Give the worker time to notice the cancellation flag between references.
    std::thread::sleep(Duration::from_millis(600));
    let started = calls.load(Ordering::SeqCst);
    assert!(
        started <= 1,
        "after cancellation the worker must not start further lookups, ran {}",
        started
    );
}

#[test]
fn test_pool_is_usable_after_a_timeout() {
    let calls = Arc::new(AtomicUsize::new(0));
    let lookup = SlowOnceLookup {
        delay: Duration::from_millis(300),
        calls: calls.clone(),
    };
    let pool = LookupPool::new(Arc::new(lookup)).expect("failed to start lookup pool");

    let first = pool.resolve_all(
        refs(&[("slow.ckpt", "checkpoints")]),
        Duration::from_millis(50),
    );
    assert!(first.timed_out);

    // The worker drains the abandoned batch, then serves this one promptly.
    let second = pool.resolve_all(
        refs(&[("quick.ckpt", "checkpoints")]),
        Duration::from_secs(5),
    );
    assert!(!second.timed_out, "the pool must recover after a timeout");
    assert_eq!(second.resolved.len(), 1);
    assert_eq!(second.resolved[0].repo_id.as_deref(), Some("org/quick.ckpt"));
}
