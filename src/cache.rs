//! Response cache for classification decisions.
//!
//! Keys are derived from the caller identity plus a canonical rendering
//! of the feature payload, so two requests with the same features in a
//! different JSON key order hit the same entry. Entries expire after a
//! configured TTL and every key carries a service prefix so a shared
//! Redis instance can be cleared without touching other tenants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Namespace prefix for every cache key this service writes.
pub const CACHE_PREFIX: &str = "intrusion-detector-cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Deterministic cache key: prefix + hash of user identity and the
/// canonical (key-sorted) feature JSON.
pub fn cache_key(features: &serde_json::Value, user_id: Uuid) -> String {
    // serde_json maps are ordered by key, so re-serializing gives a
    // canonical form regardless of the order the client sent.
    let canonical = features.to_string();
    let mut hasher = Sha256::new();
    hasher.update(format!("{user_id}:{canonical}").as_bytes());
    format!("{}:{:x}", CACHE_PREFIX, hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDecision {
    pub features: serde_json::Value,
    pub user_id: Uuid,
    pub classification_result: String,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub total_cached_items: u64,
    pub cache_prefix: String,
    pub cache_ttl_secs: u64,
}

/// Cache operations the decision path depends on. The service treats
/// every call as best-effort; implementations report failures and the
/// caller decides whether to degrade.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedDecision>, CacheError>;

    async fn put(&self, key: &str, decision: &CachedDecision) -> Result<(), CacheError>;

    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Delete every key under the service prefix, returning how many
    /// entries were removed.
    async fn clear(&self) -> Result<u64, CacheError>;
}

pub struct RedisCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisCache {
    pub fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl_secs })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    async fn prefixed_keys(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(format!("{CACHE_PREFIX}:*")).await?;
        Ok(keys)
    }
}

#[async_trait]
impl DecisionCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<CachedDecision>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, decision: &CachedDecision) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(decision)?;
        conn.set_ex::<_, _, ()>(key, json, self.ttl_secs).await?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let keys = self.prefixed_keys().await?;
        Ok(CacheStats {
            total_cached_items: keys.len() as u64,
            cache_prefix: CACHE_PREFIX.to_string(),
            cache_ttl_secs: self.ttl_secs,
        })
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let keys = self.prefixed_keys().await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }
}
