//! Response cache for generated answers.
//!
//! [`ResponseCache`] sits in front of the provider walk in the
//! [`Orchestrator`](crate::Orchestrator). A hit bypasses search, prompt
//! composition and every provider call. Entries carry their own TTL so
//! deterministic fallback answers can be kept briefly while generated
//! answers live for the full TTL.
//!
//! # Backends
//!
//! Storage is behind the [`CacheBackend`] trait. The default
//! [`InMemoryCache`] uses moka's LRU with per-entry expiry. An external
//! store (e.g. [`RedisCache`](super::RedisCache)) is layered over the
//! in-process cache with [`TieredCache`](super::TieredCache), so semantics
//! are identical whichever backend answers.
//!
//! # Isolation
//!
//! Keys are [`Fingerprint`]s over (normalized message, patient-context id,
//! mode). Two patients asking the same question never share an entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::{Deserialize, Serialize};

use super::Fingerprint;
use crate::Result;
use crate::telemetry;
use crate::types::ChatResponse;

/// Configuration for the response cache.
///
/// ```rust
/// # use medgate::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries (LRU beyond this). Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for generated answers. Default: 1 hour.
    pub ttl: Duration,
    /// Time-to-live for fallback answers; zero disables caching them.
    /// Default: 60 seconds.
    pub fallback_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
            fallback_ttl: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for generated answers.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the time-to-live for fallback answers.
    pub fn fallback_ttl(mut self, ttl: Duration) -> Self {
        self.fallback_ttl = ttl;
        self
    }
}

/// A cached answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    /// The answer as generated, citations included.
    pub response: ChatResponse,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(fingerprint: &Fingerprint, response: ChatResponse, ttl: Duration) -> Self {
        Self {
            fingerprint: fingerprint.as_str().to_string(),
            response,
            created_at: Utc::now(),
            ttl,
        }
    }

    /// Whether the entry's TTL has run out as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        TimeDelta::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.created_at.checked_add_signed(ttl))
            .is_some_and(|expires| expires <= now)
    }
}

/// Storage for cache entries.
///
/// Writes must be atomic per key: a concurrent `get` sees either the old or
/// the new entry, never a partial one.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>>;

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<()>;
}

/// Per-entry expiry from [`CacheEntry::ttl`].
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process LRU + per-entry TTL backend (moka).
pub struct InMemoryCache {
    cache: Cache<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new(max_entries: u64) -> Self {
        // Plain LRU: TinyLFU's admission filter would turn away fresh answers
        // once the cache is full.
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(EntryTtl)
            .build();
        Self { cache }
    }

    /// Approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Apply pending evictions and expirations now.
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>> {
        Ok(self.cache.get(key.as_str()).await)
    }

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<()> {
        self.cache.insert(key.as_str().to_string(), entry).await;
        Ok(())
    }
}

/// Response cache front: TTL selection, expiry checks and metrics over a
/// [`CacheBackend`].
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create an in-process response cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        let backend = Arc::new(InMemoryCache::new(config.max_entries));
        Self { backend, config }
    }

    /// Use a custom backend (e.g. a [`TieredCache`](super::TieredCache)).
    pub fn with_backend(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Look up an unexpired entry.
    ///
    /// Expired entries are misses even if the backend still holds them.
    /// Emits cache hit/miss metrics.
    pub async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>> {
        let entry = self
            .backend
            .get(key)
            .await?
            .filter(|e| e.fingerprint == key.as_str() && !e.is_expired(Utc::now()));
        if entry.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }
        Ok(entry)
    }

    /// Store an entry under its fingerprint.
    pub async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<()> {
        if entry.ttl.is_zero() {
            return Ok(());
        }
        self.backend.put(key, entry).await
    }

    /// Store a response with the TTL appropriate to its kind.
    pub async fn store(&self, key: &Fingerprint, response: &ChatResponse) -> Result<()> {
        let ttl = if response.is_fallback {
            self.config.fallback_ttl
        } else {
            self.config.ttl
        };
        self.put(key, CacheEntry::new(key, response.clone(), ttl))
            .await
    }
}
