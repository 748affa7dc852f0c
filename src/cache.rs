//! Read-through cache store used by the gateway for response caching.
//!
//! The cache is never authoritative: every error degrades to the uncached
//! path at the call site. Keys are resource-scoped strings with a fixed
//! per-resource TTL.

use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

pub const TRANSACTION_TTL_SECS: u64 = 120;
pub const STATS_TTL_SECS: u64 = 60;
pub const AGGREGATE_TTL_SECS: u64 = 60;

pub const STATS_KEY: &str = "stats:summary";
pub const AGGREGATE_KEY: &str = "aggregate:view";

pub fn transaction_key(id: &Uuid) -> String {
    format!("transaction:{}", id)
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    async fn ping(&self) -> anyhow::Result<()>;
}

/// Redis-backed cache store on a multiplexed async connection.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_seconds)
            .arg(value)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

/// In-memory cache store with TTL, for tests and local runs without Redis.
#[derive(Default, Clone)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> anyhow::Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_key_is_deterministic() {
        let id = Uuid::nil();
        assert_eq!(
            transaction_key(&id),
            "transaction:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(transaction_key(&id), transaction_key(&id));
    }

    #[tokio::test]
    async fn test_memory_cache_set_then_get() {
        let cache = MemoryCache::new();
        cache.set("transaction:abc", "{\"total\":\"1.00\"}", 60).await.unwrap();

        let value = cache.get("transaction:abc").await.unwrap();
        assert_eq!(value.as_deref(), Some("{\"total\":\"1.00\"}"));
    }

    #[tokio::test]
    async fn test_memory_cache_delete() {
        let cache = MemoryCache::new();
        cache.set("stats:summary", "{}", 60).await.unwrap();
        cache.delete("stats:summary").await.unwrap();

        assert_eq!(cache.get("stats:summary").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_cache_expires_after_ttl() {
        let cache = MemoryCache::new();
        cache.set("aggregate:view", "{}", 60).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("aggregate:view").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("aggregate:view").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_cache_overwrites_on_set() {
        let cache = MemoryCache::new();
        cache.set("k", "old", 60).await.unwrap();
        cache.set("k", "new", 60).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
    }
}
