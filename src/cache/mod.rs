// In-process cache for inventory read paths. The engine never reads through
// this cache itself; it only invalidates entries after a committed mutation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache miss")]
    Miss,
    #[error("Cache operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Instant::now() > expires_at
        } else {
            false
        }
    }
}

#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
    async fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory cache implementation
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let store = self.store.read().unwrap();
        if let Some(entry) = store.get(key) {
            if entry.is_expired() {
                drop(store);
                let mut store = self.store.write().unwrap();
                store.remove(key);
                Ok(None)
            } else {
                Ok(Some(entry.value.clone()))
            }
        } else {
            Ok(None)
        }
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.insert(key.to_string(), CacheEntry::new(value.to_string(), ttl));
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.remove(key);
        Ok(())
    }

    /// Removes every entry whose key starts with `prefix`, returning the
    /// number of entries dropped.
    pub async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut store = self.store.write().unwrap();
        let before = store.len();
        store.retain(|k, _| !k.starts_with(prefix));
        Ok((before - store.len()) as u64)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let store = self.store.read().unwrap();
        if let Some(entry) = store.get(key) {
            Ok(!entry.is_expired())
        } else {
            Ok(false)
        }
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut store = self.store.write().unwrap();
        store.clear();
        Ok(())
    }
}

#[async_trait::async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.delete(key).await
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.delete_by_prefix(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        self.exists(key).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.clear().await
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

pub type Cache = InMemoryCache;

/// Cache key for a single inventory row.
pub fn inventory_key(product_batch_id: uuid::Uuid, location_id: uuid::Uuid) -> String {
    format!("inventory:{}:{}", product_batch_id, location_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = InMemoryCache::new();
        cache.set("k1", "v1", None).await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), Some("v1".to_string()));
        cache.delete("k1").await.unwrap();
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_read_as_miss() {
        let cache = InMemoryCache::new();
        cache
            .set("k", "v", Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_by_prefix_only_touches_matching_keys() {
        let cache = InMemoryCache::new();
        let batch = uuid::Uuid::new_v4();
        let loc_a = uuid::Uuid::new_v4();
        let loc_b = uuid::Uuid::new_v4();
        cache
            .set(&inventory_key(batch, loc_a), "a", None)
            .await
            .unwrap();
        cache
            .set(&inventory_key(batch, loc_b), "b", None)
            .await
            .unwrap();
        cache.set("orders:1", "o", None).await.unwrap();

        let dropped = cache
            .delete_by_prefix(&format!("inventory:{}", batch))
            .await
            .unwrap();
        assert_eq!(dropped, 2);
        assert!(cache.exists("orders:1").await.unwrap());
    }
}
