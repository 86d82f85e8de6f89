use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RepoMatch;

/// Answers "which repository serves this file?".
///
/// The lookup orchestrator only depends on this seam, so tests can substitute
/// their own implementations for the real index client.
#[async_trait]
pub trait ModelLookup: Send + Sync {
    /// Resolves a filename to a repository, `Ok(None)` when the index has no
    /// match.
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>>;
}

/// Name components recovered from a model filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub core_name: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
}

fn version_re() -> &'static Regex {
    static VERSION_RE: OnceLock<Regex> = OnceLock::new();
    VERSION_RE.get_or_init(|| Regex::new(r"^v?\d+(-\d+)?").unwrap())
}

/// Splits a model filename into core name, version, and tags.
///
/// The extension is stripped and the stem is split on `-` and `_`. Tokens
/// starting with digits (optionally `v`-prefixed) are the version, the first
/// alphabetic token is the core name, and later tokens become tags.
pub fn parse_name_parts(filename: &str) -> NameParts {
    let stem = strip_extension(filename);
    let mut parts = NameParts::default();

    for token in stem.split(['-', '_']).filter(|t| !t.is_empty()) {
        if version_re().is_match(token) {
            parts.version = Some(token.to_string());
        } else if token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
        {
            if parts.core_name.is_none() {
                parts.core_name = Some(token.to_string());
            } else {
                parts.tags.push(token.to_string());
            }
        } else if parts.core_name.is_some() {
            parts.tags.push(token.to_string());
        }
    }

    parts
}

fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(dot) if dot + 1 < filename.len() && !filename[dot + 1..].contains('/') => {
            &filename[..dot]
        }
        _ => filename,
    }
}

/// Builds the ladder of index queries tried for a filename, most specific
/// first: core+version, core alone, core+tags. Duplicates are dropped; a
/// filename without a core name yields no queries at all.
pub fn search_queries(parts: &NameParts) -> Vec<String> {
    let Some(core) = &parts.core_name else {
        return Vec::new();
    };

    let mut queries = Vec::new();
    if let Some(version) = &parts.version {
        queries.push(format!("{}_{}", core, version));
    }
    queries.push(core.clone());

    let mut tagged = vec![core.clone()];
    tagged.extend(parts.tags.iter().cloned());
    let tagged = tagged.join("_");
    if !queries.contains(&tagged) {
        queries.push(tagged);
    }

    queries
}

/// One file entry inside a repository listing.
#[derive(Debug, Clone, Deserialize)]
pub struct HubSibling {
    pub rfilename: String,
}

/// One repository as returned by the model index.
#[derive(Debug, Clone, Deserialize)]
pub struct HubRepo {
    #[serde(rename = "modelId")]
    pub model_id: String,
    #[serde(default)]
    pub siblings: Vec<HubSibling>,
}

/// Returns the first repository whose file list contains `filename` exactly.
pub fn find_match(repos: &[HubRepo], filename: &str) -> Option<RepoMatch> {
    for repo in repos {
        if repo.siblings.iter().any(|s| s.rfilename == filename) {
            return Some(RepoMatch {
                repo_id: repo.model_id.clone(),
                filename: filename.to_string(),
            });
        }
    }
    None
}

/// Client for the Hugging Face model index.
///
/// Outcomes are memoized per lowercased filename for the life of the client,
/// misses included, so repeated scans do not re-query the index.
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
    memo: Mutex<HashMap<String, Option<RepoMatch>>>,
}

impl HubClient {
    /// Creates a client against `base_url`. Production uses
    /// `https://huggingface.co`; tests point this at a local server.
    pub fn new(base_url: &str) -> HubClient {
        HubClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<HubRepo>> {
        let url = format!("{}/api/models", self.base_url);
        let repos = self
            .http
            .get(&url)
            .query(&[("full", "true"), ("search", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(repos)
    }
}

#[async_trait]
impl ModelLookup for HubClient {
    async fn lookup(&self, filename: &str) -> Result<Option<RepoMatch>> {
        let cache_key = filename.to_lowercase();
        if let Some(cached) = self.memo.lock().expect("memo lock").get(&cache_key) {
            debug!("memoized index outcome for {}", filename);
            return Ok(cached.clone());
        }

        let queries = search_queries(&parse_name_parts(filename));
        if queries.is_empty() {
            debug!("no usable name components in {}, skipping index", filename);
        }

        let mut outcome = None;
        for query in &queries {
            match self.search(query).await {
                Ok(repos) => {
                    if let Some(found) = find_match(&repos, filename) {
                        debug!("{} resolved to {} via query {}", filename, found.repo_id, query);
                        outcome = Some(found);
                        break;
                    }
                }
                // A failed query is not fatal; the next rung may still hit.
                Err(e) => warn!("index query {} failed: {}", query, e),
            }
        }

        self.memo
            .lock()
            .expect("memo lock")
            .insert(cache_key, outcome.clone());
        Ok(outcome)
    }
}
