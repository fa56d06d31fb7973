//! Cache backend implementations.
//!
//! - **InMemoryBackend**: process-local expiring map, used in tests and single-node setups
//! - **RedisBackend**: shared cache with native key expiry
//!
//! Every write carries a TTL. Nothing in this layer stores an entry forever.

use crate::error::{AccessError, ErrorCode, ErrorContext, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use metrics::{counter, gauge};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// `exists` calls that found a live key
    pub hits: u64,

    /// `exists` calls that found nothing
    pub misses: u64,

    /// Total number of live entries (approximate for Redis)
    pub entries: u64,

    /// Entries removed by explicit sweeps
    pub purged: u64,

    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,

    /// Backend-specific stats
    pub backend_stats: HashMap<String, String>,
}

impl CacheStats {
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Backend Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Key/value cache with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Store `value` under `key` for `ttl`. Overwrites refresh the TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Whether a live (unexpired) entry exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove an entry. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Count live entries whose key starts with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<u64>;

    /// Remove expired entries under `prefix`; returns how many were removed.
    async fn purge_expired(&self, prefix: &str) -> Result<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats>;

    /// Get the backend name.
    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

struct InMemoryEntry {
    #[allow(dead_code)]
    data: Vec<u8>,
    expires_at: Instant,
}

impl InMemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory cache backend.
///
/// Expiry is measured on the tokio clock, so tests running with a paused
/// runtime can advance time deterministically.
pub struct InMemoryBackend {
    entries: DashMap<String, InMemoryEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    purged: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            purged: AtomicU64::new(0),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn raw_len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Err(AccessError::new(
                ErrorCode::InvalidInput,
                "cache entries require a non-zero TTL",
            ));
        }

        self.entries.insert(
            key.to_string(),
            InMemoryEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );

        counter!("cache_sets_total", "backend" => "in_memory").increment(1);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let live = self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()));

        if live {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(live)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            counter!("cache_deletes_total", "backend" => "in_memory").increment(1);
        }
        Ok(removed)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired(now))
            .count() as u64)
    }

    async fn purge_expired(&self, prefix: &str) -> Result<u64> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|key, entry| !(key.starts_with(prefix) && entry.is_expired(now)));
        let purged = before.saturating_sub(self.entries.len()) as u64;

        self.purged.fetch_add(purged, Ordering::Relaxed);
        if purged > 0 {
            debug!(purged, prefix, "Purged expired cache entries");
        }
        Ok(purged)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let now = Instant::now();
        let entries = self.entries.iter().filter(|e| !e.value().is_expired(now)).count() as u64;

        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            purged: self.purged.load(Ordering::Relaxed),
            hit_rate: 0.0,
            backend_stats: HashMap::new(),
        };
        stats.calculate_hit_rate();
        stats
            .backend_stats
            .insert("stored_entries".to_string(), self.entries.len().to_string());

        gauge!("cache_entries", "backend" => "in_memory").set(entries as f64);
        Ok(stats)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Redis reply to `TTL` for a key that no longer exists.
const TTL_KEY_MISSING: i64 = -2;

/// Redis cache backend.
pub struct RedisBackend {
    client: redis::Client,
    url: String,
    hits: AtomicU64,
    misses: AtomicU64,
    purged: AtomicU64,
}

impl RedisBackend {
    /// Connect and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context(ErrorCode::CacheConnectionFailed, "Invalid Redis URL")?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .context(ErrorCode::CacheConnectionFailed, "Failed to connect to Redis")?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context(ErrorCode::CacheConnectionFailed, "Redis ping failed")?;

        info!("Redis cache backend connected to {}", url);

        Ok(Self {
            client,
            url: url.to_string(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            purged: AtomicU64::new(0),
        })
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context(ErrorCode::CacheConnectionFailed, "Failed to get Redis connection")
    }

    /// Cursor over every key matching `prefix*`.
    async fn scan_prefix(&self, conn: &mut redis::aio::MultiplexedConnection, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(conn)
                .await?;

            found.extend(keys);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let secs = ttl.as_secs().max(1);
        let mut conn = self.get_conn().await?;
        conn.set_ex::<_, _, ()>(key, value, secs).await?;

        counter!("cache_sets_total", "backend" => "redis").increment(1);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let exists: bool = conn.exists(key).await?;

        if exists {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(exists)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let deleted: i64 = conn.del(key).await?;
        if deleted > 0 {
            counter!("cache_deletes_total", "backend" => "redis").increment(1);
        }
        Ok(deleted > 0)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let keys = self.scan_prefix(&mut conn, prefix).await?;
        Ok(keys.len() as u64)
    }

    /// Redis expires keys on its own; this sweep removes keys that SCAN still
    /// reports but whose TTL says they are already gone.
    async fn purge_expired(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.get_conn().await?;
        let keys = self.scan_prefix(&mut conn, prefix).await?;

        let mut purged = 0u64;
        for key in keys {
            let ttl: i64 = conn.ttl(&key).await?;
            if ttl == TTL_KEY_MISSING {
                let _: i64 = conn.del(&key).await?;
                purged += 1;
            }
        }

        self.purged.fetch_add(purged, Ordering::Relaxed);
        Ok(purged)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut conn = self.get_conn().await?;

        let info: String = redis::cmd("INFO").arg("memory").query_async(&mut conn).await?;
        let mut backend_stats = HashMap::new();
        for line in info.lines() {
            if let Some(value) = line.strip_prefix("used_memory_human:") {
                backend_stats.insert("used_memory_human".to_string(), value.trim().to_string());
            }
        }
        backend_stats.insert("url".to_string(), self.url.clone());

        let dbsize: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;

        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: dbsize,
            purged: self.purged.load(Ordering::Relaxed),
            hit_rate: 0.0,
            backend_stats,
        };
        stats.calculate_hit_rate();

        gauge!("cache_entries", "backend" => "redis").set(dbsize as f64);
        Ok(stats)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_entry_expires() {
        let backend = InMemoryBackend::new();
        backend.set("k", b"1", Duration::from_secs(60)).await.unwrap();
        assert!(backend.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(backend.exists("k").await.unwrap());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!backend.exists("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_respects_prefix() {
        let backend = InMemoryBackend::new();
        backend.set("blacklist:a", b"1", Duration::from_secs(10)).await.unwrap();
        backend.set("blacklist:b", b"1", Duration::from_secs(100)).await.unwrap();
        backend.set("other:c", b"1", Duration::from_secs(10)).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(backend.purge_expired("blacklist:").await.unwrap(), 1);
        assert_eq!(backend.raw_len(), 2);
        assert_eq!(backend.count_prefix("blacklist:").await.unwrap(), 1);
        assert_eq!(backend.stats().await.unwrap().purged, 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let backend = InMemoryBackend::new();
        assert!(backend.set("k", b"1", Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_and_stats() {
        let backend = InMemoryBackend::new();
        backend.set("k", b"1", Duration::from_secs(5)).await.unwrap();
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        assert!(!backend.exists("k").await.unwrap());

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }
}
