use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::rate_source::RateSource;
use crate::error::AppResult;

#[derive(Debug, Clone)]
struct CachedRate {
    rate: Decimal,
    fetched_at: DateTime<Utc>,
}

/// Pair key: (base, quote)
type CacheKey = (String, String);

/// TTL cache in front of another rate source. Only known rates are cached.
pub struct CachedRateSource {
    inner: Arc<dyn RateSource>,
    cache: RwLock<HashMap<CacheKey, CachedRate>>,
    ttl_ms: u64,
}

impl CachedRateSource {
    pub fn new(inner: Arc<dyn RateSource>, ttl_ms: u64) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            ttl_ms,
        }
    }

    fn is_fresh(&self, entry: &CachedRate) -> bool {
        (Utc::now() - entry.fetched_at).num_milliseconds() < self.ttl_ms as i64
    }

    pub async fn size(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Drop expired entries
    pub async fn cleanup_expired(&self) {
        let mut cache = self.cache.write().await;
        let before = cache.len();
        let ttl_ms = self.ttl_ms as i64;
        let now = Utc::now();
        cache.retain(|_, entry| (now - entry.fetched_at).num_milliseconds() < ttl_ms);

        if before > cache.len() {
            info!("🧹 Cleaned up {} expired rates", before - cache.len());
        }
    }
}

#[async_trait]
impl RateSource for CachedRateSource {
    async fn get_rate(&self, base: &str, quote: &str) -> AppResult<Option<Decimal>> {
        let key = (base.to_uppercase(), quote.to_uppercase());

        if let Some(entry) = self.cache.read().await.get(&key) {
            if self.is_fresh(entry) {
                debug!("✓ Rate cache hit: {}/{}", key.0, key.1);
                return Ok(Some(entry.rate));
            }
        }

        let rate = self.inner.get_rate(base, quote).await?;

        if let Some(rate) = rate {
            self.cache.write().await.insert(
                key,
                CachedRate {
                    rate,
                    fetched_at: Utc::now(),
                },
            );
        }

        Ok(rate)
    }
}
