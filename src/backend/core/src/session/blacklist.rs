//! Token blacklist over a [`CacheBackend`].
//!
//! Tokens are never stored raw: the key is `prefix + sha256(token)` in hex.
//! Entries expire with the TTL given at insertion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::cache::CacheBackend;
use crate::config::BlacklistConfig;
use crate::error::{AccessError, Result};
use crate::telemetry::AccessMetrics;

/// Hex SHA-256 of a raw token.
pub fn token_hash(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Blacklist statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistStats {
    pub total_blacklisted_tokens: u64,
    pub timestamp: DateTime<Utc>,
    pub scan_method: String,
    pub backend: String,
}

#[derive(Clone)]
pub struct TokenBlacklist {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
}

impl TokenBlacklist {
    pub fn new(backend: Arc<dyn CacheBackend>, config: &BlacklistConfig) -> Self {
        Self {
            backend,
            prefix: config.key_prefix.clone(),
        }
    }

    pub fn cache_key(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token_hash(token))
    }

    /// Blacklist `token` for `ttl`. Re-adding refreshes the TTL.
    pub async fn add(&self, token: &str, ttl: Duration) -> Result<()> {
        let key = self.cache_key(token);
        match self.backend.set(&key, b"1", ttl).await {
            Ok(()) => {
                AccessMetrics::blacklist_operation("add", "ok");
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Token blacklisted");
                Ok(())
            }
            Err(e) => {
                AccessMetrics::blacklist_operation("add", "error");
                Err(AccessError::blacklist_write_failed(e.to_string()).with_source(e))
            }
        }
    }

    pub async fn is_blacklisted(&self, token: &str) -> Result<bool> {
        self.backend.exists(&self.cache_key(token)).await
    }

    /// Returns whether the token was blacklisted. Callers outside the session
    /// module go through `LogoutService::remove_from_blacklist`, which audits.
    pub(crate) async fn remove(&self, token: &str) -> Result<bool> {
        let removed = self.backend.delete(&self.cache_key(token)).await?;
        AccessMetrics::blacklist_operation("remove", if removed { "ok" } else { "absent" });
        Ok(removed)
    }

    /// Sweep expired entries. Returns the number removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let purged = self.backend.purge_expired(&self.prefix).await?;
        AccessMetrics::blacklist_swept(purged);
        info!(purged, "Blacklist sweep complete");
        Ok(purged)
    }

    pub async fn stats(&self) -> Result<BlacklistStats> {
        let total = self.backend.count_prefix(&self.prefix).await?;
        Ok(BlacklistStats {
            total_blacklisted_tokens: total,
            timestamp: Utc::now(),
            scan_method: "prefix_scan".to_string(),
            backend: self.backend.name().to_string(),
        })
    }
}
