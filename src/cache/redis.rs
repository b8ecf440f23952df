//! Redis-backed cache entries, shared across processes.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::{CacheBackend, CacheEntry, Fingerprint};
use crate::{MedgateError, Result};

const KEY_PREFIX: &str = "medgate:response:";

/// Entries stored as JSON with a Redis-side expiry matching the entry TTL.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| MedgateError::Configuration(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MedgateError::CacheBackendUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn key(fingerprint: &Fingerprint) -> String {
        format!("{KEY_PREFIX}{fingerprint}")
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &Fingerprint) -> Result<Option<CacheEntry>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(key))
            .await
            .map_err(|e| MedgateError::CacheBackendUnavailable(e.to_string()))?;
        // An undecodable value is treated as absent rather than an outage
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    async fn put(&self, key: &Fingerprint, entry: CacheEntry) -> Result<()> {
        let ttl_secs = entry.ttl.as_secs().max(1);
        let value = serde_json::to_string(&entry)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(key), value, ttl_secs)
            .await
            .map_err(|e| MedgateError::CacheBackendUnavailable(e.to_string()))
    }
}
