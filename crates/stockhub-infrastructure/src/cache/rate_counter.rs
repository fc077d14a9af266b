// ============================================================================
// StockHub Infrastructure - Redis Rate Counter
// File: crates/stockhub-infrastructure/src/cache/rate_counter.rs
// Description: Per-tenant fixed-window counters shared across instances
// ============================================================================

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::{error, info};

use stockhub_core::error::DomainError;
use stockhub_core::repositories::{RateCounter, RateWindowKey};
use stockhub_shared::config::RedisSettings;

/// Build a Redis connection pool from settings.
pub fn create_redis_pool(settings: &RedisSettings) -> Result<Pool, DomainError> {
    info!("Creating Redis pool ({} max connections)", settings.max_connections);

    let mut config = Config::from_url(settings.url.clone());
    config.pool = Some(PoolConfig::new(settings.max_connections as usize));

    config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| DomainError::CacheError(e.to_string()))
}

fn cache_error(context: &str, e: impl std::fmt::Display) -> DomainError {
    error!("Cache error {}: {}", context, e);
    DomainError::CacheError(e.to_string())
}

pub struct RedisRateCounter {
    pool: Pool,
}

impl RedisRateCounter {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn increment(&self, key: &RateWindowKey) -> Result<u64, DomainError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| cache_error("acquiring connection", e))?;

        let cache_key = key.cache_key();
        // Keys expire with their window; one extra second covers clock skew.
        let ttl = (key.window_end() - Utc::now()).num_seconds().max(0) + 1;

        let (count,): (u64,) = redis::pipe()
            .atomic()
            .incr(&cache_key, 1u64)
            .expire(&cache_key, ttl)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| cache_error("incrementing rate counter", e))?;

        Ok(count)
    }

    async fn current(&self, key: &RateWindowKey) -> Result<u64, DomainError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| cache_error("acquiring connection", e))?;

        let count: Option<u64> = conn
            .get(key.cache_key())
            .await
            .map_err(|e| cache_error("reading rate counter", e))?;

        Ok(count.unwrap_or(0))
    }
}
