//! External cache layered over the in-process one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{CacheBackend, CacheEntry, Fingerprint, InMemoryCache};
use crate::Result;
use crate::telemetry;

/// Reads from the primary backend and falls back to the local cache when the
/// primary is unreachable. Writes go to both; a failed primary write is
/// logged and absorbed.
pub struct TieredCache {
    primary: Arc<dyn CacheBackend>,
    local: InMemoryCache,
}

impl TieredCache {
    pub fn new(primary: Arc<dyn CacheBackend>, local: InMemoryCache) -> Self {
        Self { primary, local }
    }
}

#[async_trait]
impl CacheBackend for TieredCache {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>> {
        match self.primary.get(key).await {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => self.local.get(key).await,
            Err(e) => {
                metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
                warn!(backend = self.primary.name(), error = %e, "cache read failed, using local cache");
                self.local.get(key).await
            }
        }
    }

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<()> {
        self.local.put(key, entry.clone()).await?;
        if let Err(e) = self.primary.put(key, entry).await {
            metrics::counter!(telemetry::CACHE_ERRORS_TOTAL).increment(1);
            warn!(backend = self.primary.name(), error = %e, "cache write failed, kept locally");
        }
        Ok(())
    }
}
