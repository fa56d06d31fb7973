//! Cache layer backing the token blacklist.
//!
//! ```text
//!   TokenBlacklist ──► CacheBackend ──┬──► InMemoryBackend (DashMap, tokio clock)
//!                                     └──► RedisBackend (SET EX / EXISTS / SCAN)
//! ```

pub mod backend;

pub use backend::{CacheBackend, CacheStats, InMemoryBackend, RedisBackend};

use std::sync::Arc;

use crate::config::RedisConfig;
use crate::error::Result;

/// Connect the shared Redis backend described by `config`.
pub async fn connect_redis(config: &RedisConfig) -> Result<Arc<dyn CacheBackend>> {
    let backend = RedisBackend::connect(&config.url).await?;
    Ok(Arc::new(backend))
}
