use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use super::rate_source::RateSource;
use crate::config::OracleConfig;
use crate::error::{AppResult, QuoteError};

/// Entry of Hermes `GET /api/latest_price_feeds`
#[derive(Debug, Deserialize, Clone)]
pub struct PriceFeed {
    pub id: String,
    pub price: PythPrice,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PythPrice {
    pub price: String,
    pub conf: String,
    pub expo: i32,
    pub publish_time: i64,
}

impl PythPrice {
    /// Apply the exponent: price * 10^expo
    pub fn to_decimal(&self) -> Result<Decimal, QuoteError> {
        let mantissa = Decimal::from_str(&self.price)
            .map_err(|e| QuoteError::PriceUnavailable(format!("Bad price {}: {}", self.price, e)))?;

        let scale = Decimal::from(10i64.pow(self.expo.unsigned_abs().min(18)));
        Ok(if self.expo < 0 {
            mantissa / scale
        } else {
            mantissa * scale
        })
    }
}

fn normalize_feed_id(id: &str) -> String {
    id.trim_start_matches("0x").to_lowercase()
}

/// USD price feeds from a Pyth Hermes endpoint; cross rates are
/// `price(base) / price(quote)`
pub struct HermesRateSource {
    client: Client,
    base_url: String,
    feed_ids: HashMap<String, String>,
}

impl HermesRateSource {
    pub fn new(config: &OracleConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let feed_ids = config
            .feed_ids
            .iter()
            .map(|(asset, id)| (asset.to_uppercase(), normalize_feed_id(id)))
            .collect();

        Ok(Self {
            client,
            base_url: config.hermes_url.trim_end_matches('/').to_string(),
            feed_ids,
        })
    }

    fn feed_id(&self, asset: &str) -> Option<&String> {
        self.feed_ids.get(&asset.to_uppercase())
    }

    async fn fetch_prices(&self, ids: &[&String]) -> AppResult<HashMap<String, PythPrice>> {
        let url = format!("{}/api/latest_price_feeds", self.base_url);
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids[]", id.as_str())).collect();

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| QuoteError::PriceUnavailable(format!("Hermes request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(QuoteError::PriceUnavailable(format!(
                "Hermes returned HTTP {}",
                response.status()
            ))
            .into());
        }

        let feeds: Vec<PriceFeed> = response
            .json()
            .await
            .map_err(|e| QuoteError::PriceUnavailable(format!("Bad Hermes response: {}", e)))?;

        Ok(feeds
            .into_iter()
            .map(|feed| (normalize_feed_id(&feed.id), feed.price))
            .collect())
    }
}

#[async_trait]
impl RateSource for HermesRateSource {
    async fn get_rate(&self, base: &str, quote: &str) -> AppResult<Option<Decimal>> {
        let (base_id, quote_id) = match (self.feed_id(base), self.feed_id(quote)) {
            (Some(b), Some(q)) => (b, q),
            _ => {
                warn!("No price feed configured for {}/{}", base, quote);
                return Ok(None);
            }
        };

        let prices = self.fetch_prices(&[base_id, quote_id]).await?;

        let (base_price, quote_price) = match (prices.get(base_id), prices.get(quote_id)) {
            (Some(b), Some(q)) => (b.to_decimal()?, q.to_decimal()?),
            _ => return Ok(None),
        };

        if quote_price.is_zero() {
            return Ok(None);
        }

        let rate = base_price / quote_price;
        debug!("💱 Hermes rate: 1 {} = {} {}", base, rate, quote);
        Ok(Some(rate))
    }
}
