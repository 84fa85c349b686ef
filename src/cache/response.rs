//! Fingerprint-keyed response cache with an optional durable mirror.
//!
//! [`ResponseCache`] stores finished [`QueryResponse`]s keyed by a
//! [`Fingerprint`] of the normalized question and the model. Entries are
//! immutable: the first response stored under a fingerprint wins.
//!
//! # Persistence
//!
//! When a snapshot path is configured, every successful [`put()`](ResponseCache::put)
//! rewrites the whole mirror file as a JSON array of
//! `{fingerprint, result, timestamp}` objects ordered by insertion time.
//! Rewrites are serialized and go through a temp file plus rename, so a
//! reader never sees a torn snapshot. The mirror is a write-only artifact:
//! [`open()`](ResponseCache::open) deletes it and the process starts cold.
//! Persistence failures are logged and never reach the caller.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::storage;
use crate::telemetry;
use crate::types::QueryResponse;

/// Configuration for the response cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .path("cache/cache.json")
///     .max_entries(5_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Snapshot file. `None` keeps the cache memory-only.
    pub path: Option<PathBuf>,
    /// Maximum number of cached entries. Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: none (live for the process).
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_entries: 10_000,
            ttl: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the cache to this file.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Cache key: lowercase hex SHA-256 of `"{normalized question}_{model}"`.
///
/// The question is trimmed and lowercased, so inputs differing only in case
/// or surrounding whitespace share a fingerprint. The model is used verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of `question` asked of `model`.
    pub fn new(question: &str, model: &str) -> Self {
        let normalized = question.trim().to_lowercase();
        let digest = Sha256::digest(format!("{normalized}_{model}").as_bytes());
        Self(format!("{digest:x}"))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

/// Shorthand for [`Fingerprint::new`].
pub fn fingerprint(question: &str, model: &str) -> Fingerprint {
    Fingerprint::new(question, model)
}

/// One cached response as it appears in the snapshot file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub result: QueryResponse,
    pub timestamp: DateTime<Utc>,
}

/// In-memory response cache, optionally mirrored to a file.
pub struct ResponseCache {
    cache: Cache<Fingerprint, CacheEntry>,
    snapshot: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl ResponseCache {
    /// Create a memory-only cache; any configured path is ignored.
    pub fn new(config: &CacheConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a cache mirrored to `config.path`.
    ///
    /// A snapshot left by a previous process is deleted so lookups never
    /// serve stale state. Failing to delete it is logged, not fatal.
    pub async fn open(config: &CacheConfig) -> Self {
        if let Some(path) = &config.path {
            if let Err(e) = storage::remove_if_exists(path).await {
                warn!(path = %path.display(), error = %e, "failed to clear cache snapshot");
            }
        }
        Self::build(config, config.path.clone())
    }

    fn build(config: &CacheConfig, snapshot: Option<PathBuf>) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_entries);
        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            cache: builder.build(),
            snapshot,
            write_lock: Mutex::new(()),
        }
    }

    /// Snapshot file, if mirroring is enabled.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    /// Look up a cached response. Emits cache hit/miss metrics.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<QueryResponse> {
        match self.cache.get(fingerprint).await {
            Some(entry) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(%fingerprint, "response cache hit");
                Some(entry.result)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(%fingerprint, "response cache miss");
                None
            }
        }
    }

    /// Store `result` under `fingerprint`.
    ///
    /// Returns `true` if this call inserted the entry, `false` if one was
    /// already present (the existing entry is kept). The mirror is rewritten
    /// only when the call inserted.
    pub async fn put(&self, fingerprint: Fingerprint, result: QueryResponse) -> bool {
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            result,
            timestamp: Utc::now(),
        };
        let inserted = self.cache.entry(fingerprint).or_insert(entry).await.is_fresh();
        if inserted {
            self.persist().await;
        }
        inserted
    }

    /// Current entries ordered by insertion time.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.cache.iter().map(|(_, e)| e).collect();
        entries.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        entries
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.cache.iter().count()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self) {
        let Some(path) = &self.snapshot else {
            return;
        };
        let _guard = self.write_lock.lock().await;
        let snapshot = self.entries();
        let written = match serde_json::to_vec_pretty(&snapshot) {
            Ok(bytes) => storage::write_atomic(path, &bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            error!(path = %path.display(), error = %e, "failed to persist response cache");
        }
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("snapshot", &self.snapshot)
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
