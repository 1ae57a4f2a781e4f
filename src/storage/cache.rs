// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key/value and list cache used by the watch registry.
//!
//! Two backends:
//!
//! - [`RedisListCache`] - shared across processes; `set_list` is a
//!   `MULTI RPUSH EXPIRE EXEC` pipeline so the returned length and the TTL
//!   refresh are atomic.
//! - [`MemoryListCache`] - single process; an LRU of TTL'd entries behind a
//!   mutex. Expiry uses `tokio::time::Instant` so paused-clock tests can
//!   advance it.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::time::Instant;

use crate::error::WalletError;

/// Default number of keys kept by the in-process cache.
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("key `{0}` holds a different type")]
    WrongType(String),

    #[error("cache lock poisoned")]
    Poisoned,
}

impl From<CacheError> for WalletError {
    fn from(err: CacheError) -> Self {
        WalletError::Storage(err.to_string())
    }
}

#[async_trait]
pub trait ListCache: Send + Sync {
    /// Set a string value, optionally expiring after `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Append `value` to the list at `key` and reset its TTL. Returns the new length.
    async fn set_list(&self, key: &str, value: &str, ttl: Duration) -> Result<usize, CacheError>;

    /// Whole list, oldest first. Missing key is an empty list.
    async fn get_list(&self, key: &str) -> Result<Vec<String>, CacheError>;
}

// =============================================================================
// Redis
// =============================================================================

pub struct RedisListCache {
    conn: ConnectionManager,
}

impl RedisListCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl ListCache for RedisListCache {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: usize = conn.del(key).await?;
        Ok(())
    }

    async fn set_list(&self, key: &str, value: &str, ttl: Duration) -> Result<usize, CacheError> {
        let mut conn = self.conn.clone();
        let (len, _): (usize, i64) = redis::pipe()
            .atomic()
            .rpush(key, value)
            .expire(key, ttl.as_secs().max(1) as i64)
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.lrange(key, 0, -1).await?)
    }
}

// =============================================================================
// In-process
// =============================================================================

#[derive(Clone)]
enum Value {
    Text(String),
    List(Vec<String>),
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process [`ListCache`] for single-instance deployments and tests.
pub struct MemoryListCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl MemoryListCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Lock the map with `key` already evicted if it has expired.
    fn live(&self, key: &str) -> Result<MutexGuard<'_, LruCache<String, CacheEntry>>, CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        if entries
            .peek(key)
            .is_some_and(|entry| !entry.is_live(Instant::now()))
        {
            entries.pop(key);
        }
        Ok(entries)
    }
}

impl Default for MemoryListCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl ListCache for MemoryListCache {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut entries = self.live(key)?;
        entries.put(
            key.to_string(),
            CacheEntry {
                value: Value::Text(value.to_string()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.live(key)?;
        match entries.get(key).map(|entry| &entry.value) {
            Some(Value::Text(text)) => Ok(Some(text.clone())),
            Some(Value::List(_)) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.live(key)?;
        entries.pop(key);
        Ok(())
    }

    async fn set_list(&self, key: &str, value: &str, ttl: Duration) -> Result<usize, CacheError> {
        let mut entries = self.live(key)?;
        let expires_at = Some(Instant::now() + ttl);

        match entries.get_mut(key) {
            Some(entry) => match &mut entry.value {
                Value::List(items) => {
                    items.push(value.to_string());
                    entry.expires_at = expires_at;
                    Ok(items.len())
                }
                Value::Text(_) => Err(CacheError::WrongType(key.to_string())),
            },
            None => {
                entries.put(
                    key.to_string(),
                    CacheEntry {
                        value: Value::List(vec![value.to_string()]),
                        expires_at,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn get_list(&self, key: &str) -> Result<Vec<String>, CacheError> {
        let mut entries = self.live(key)?;
        match entries.get(key).map(|entry| &entry.value) {
            Some(Value::List(items)) => Ok(items.clone()),
            Some(Value::Text(_)) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn list_grows_and_expires_together() {
        let cache = MemoryListCache::default();
        let ttl = Duration::from_secs(120);

        assert_eq!(cache.set_list("watch", "0xaaa", ttl).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(cache.set_list("watch", "0xbbb", ttl).await.unwrap(), 2);

        // The second append refreshed the TTL for the whole list.
        tokio::time::advance(Duration::from_secs(100)).await;
        assert_eq!(cache.get_list("watch").await.unwrap(), vec!["0xaaa", "0xbbb"]);

        tokio::time::advance(Duration::from_secs(21)).await;
        assert!(cache.get_list("watch").await.unwrap().is_empty());
        assert_eq!(cache.set_list("watch", "0xccc", ttl).await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn values_respect_optional_ttl() {
        let cache = MemoryListCache::default();
        cache.put("a", "1", Some(Duration::from_secs(5))).await.unwrap();
        cache.put("b", "2", None).await.unwrap();
        assert_eq!(cache.get("a").await.unwrap().as_deref(), Some("1"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("b").await.unwrap().as_deref(), Some("2"));

        cache.delete("b").await.unwrap();
        assert_eq!(cache.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn type_mismatch_is_reported() {
        let cache = MemoryListCache::default();
        cache.put("k", "v", None).await.unwrap();
        assert!(matches!(
            cache.set_list("k", "x", Duration::from_secs(1)).await,
            Err(CacheError::WrongType(_))
        ));
        assert!(matches!(cache.get_list("k").await, Err(CacheError::WrongType(_))));
    }

    #[tokio::test]
    async fn concurrent_appends_see_distinct_lengths() {
        let cache = std::sync::Arc::new(MemoryListCache::default());
        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .set_list("watch", &format!("0x{i:02}"), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut lengths = Vec::new();
        for handle in handles {
            lengths.push(handle.await.unwrap());
        }
        lengths.sort_unstable();
        assert_eq!(lengths, (1..=16).collect::<Vec<_>>());
    }
}
