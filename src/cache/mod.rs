//! Caching subsystem.
//!
//! - [`Fingerprint`]: request key over (normalized message, patient id, mode)
//! - [`ResponseCache`]: TTL/LRU answer cache consulted before any provider call
//! - [`CacheBackend`]: storage seam; [`InMemoryCache`] by default,
//!   [`TieredCache`] to put an external store (such as `RedisCache` with
//!   the `redis` feature) in front of it

pub mod fingerprint;
#[cfg(feature = "redis")]
pub mod redis;
pub mod response;
pub mod tiered;

pub use fingerprint::{Fingerprint, normalize};
#[cfg(feature = "redis")]
pub use self::redis::RedisCache;
pub use response::{CacheBackend, CacheConfig, CacheEntry, InMemoryCache, ResponseCache};
pub use tiered::TieredCache;
