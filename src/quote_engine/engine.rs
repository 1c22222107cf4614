use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::{Quote, StoredQuote};
use super::rate_source::RateSource;
use crate::config::EngineConfig;
use crate::error::{AppResult, QuoteError};
use crate::events::{EngineEvent, EventBus};
use crate::store::{EntityStore, KeyedLocks};

const BPS_DENOMINATOR: u32 = 10_000;

/// How long an expired quote stays retrievable before eviction
const QUOTE_RETENTION_MINUTES: i64 = 60;

fn bps(value: u32) -> Decimal {
    Decimal::from(value) / Decimal::from(BPS_DENOMINATOR)
}

fn overflow() -> QuoteError {
    QuoteError::InvalidQuoteRequest("Input amount is too large to price".to_string())
}

/// Output-side amounts of a quote
struct Pricing {
    estimated_output: Decimal,
    min_output: Decimal,
    platform_fee: Decimal,
    final_output_after_fees: Decimal,
}

fn price(
    input_amount: Decimal,
    rate: Decimal,
    network_fee_in_output: Decimal,
    slippage_bps: u32,
    platform_fee_bps: u32,
) -> Result<Pricing, QuoteError> {
    let estimated_output = input_amount.checked_mul(rate).ok_or_else(overflow)?;
    let min_output = Decimal::ONE
        .checked_sub(bps(slippage_bps))
        .and_then(|factor| estimated_output.checked_mul(factor))
        .ok_or_else(overflow)?;
    let platform_fee = estimated_output
        .checked_mul(bps(platform_fee_bps))
        .ok_or_else(overflow)?;
    let final_output_after_fees = estimated_output
        .checked_sub(platform_fee)
        .and_then(|net| net.checked_sub(network_fee_in_output))
        .ok_or_else(overflow)?
        .max(Decimal::ZERO);

    Ok(Pricing {
        estimated_output,
        min_output,
        platform_fee,
        final_output_after_fees,
    })
}

/// Quote engine - prices conversions and tracks single-use quotes
pub struct QuoteEngine {
    config: Arc<EngineConfig>,
    rates: Arc<dyn RateSource>,
    quotes: Arc<dyn EntityStore<StoredQuote>>,
    locks: KeyedLocks,
    bus: EventBus,
}

impl QuoteEngine {
    pub fn new(
        config: Arc<EngineConfig>,
        rates: Arc<dyn RateSource>,
        quotes: Arc<dyn EntityStore<StoredQuote>>,
        bus: EventBus,
    ) -> Self {
        Self {
            config,
            rates,
            quotes,
            locks: KeyedLocks::new(),
            bus,
        }
    }

    async fn rate(&self, base: &str, quote: &str) -> AppResult<Decimal> {
        match self.rates.get_rate(base, quote).await? {
            Some(rate) if rate > Decimal::ZERO => Ok(rate),
            _ => {
                warn!("No usable rate for {}/{}", base, quote);
                Err(QuoteError::PriceUnavailable(format!("{}/{}", base, quote)).into())
            }
        }
    }

    /// Price `input_amount` of `input_asset` in `output_asset`
    pub async fn quote(
        &self,
        input_asset: &str,
        output_asset: &str,
        input_amount: Decimal,
    ) -> AppResult<Quote> {
        let input_asset = input_asset.trim().to_uppercase();
        let output_asset = output_asset.trim().to_uppercase();

        if input_asset == output_asset {
            warn!("Rejected same-asset quote for {}", input_asset);
            return Err(QuoteError::InvalidQuoteRequest(
                "Input and output assets must differ".to_string(),
            )
            .into());
        }

        if input_amount <= Decimal::ZERO {
            return Err(QuoteError::InvalidQuoteRequest(
                "Input amount must be positive".to_string(),
            )
            .into());
        }

        for asset in [&input_asset, &output_asset] {
            if !self.config.is_supported_asset(asset) {
                return Err(QuoteError::UnsupportedAsset(asset.clone()).into());
            }
        }

        let rate = self.rate(&input_asset, &output_asset).await?;

        let fee_asset = self.config.network_fee_asset.to_uppercase();
        let network_fee_in_output = if fee_asset == output_asset {
            self.config.network_fee_units
        } else {
            let fee_rate = self.rate(&fee_asset, &output_asset).await?;
            self.config
                .network_fee_units
                .checked_mul(fee_rate)
                .ok_or_else(overflow)?
        };

        let pricing = price(
            input_amount,
            rate,
            network_fee_in_output,
            self.config.slippage_bps,
            self.config.platform_fee_bps,
        )
        .map_err(|e| {
            warn!("Rejected quote for {} {}: {}", input_amount, input_asset, e);
            e
        })?;

        let generated_at = Utc::now();
        let quote = Quote {
            id: Uuid::new_v4(),
            input_asset,
            output_asset,
            input_amount,
            rate,
            estimated_output: pricing.estimated_output,
            min_output: pricing.min_output,
            slippage_bps: self.config.slippage_bps,
            platform_fee_bps: self.config.platform_fee_bps,
            platform_fee: pricing.platform_fee,
            network_fee_units: self.config.network_fee_units,
            network_fee_in_output,
            final_output_after_fees: pricing.final_output_after_fees,
            generated_at,
            expires_at: generated_at + self.config.quote_ttl(),
        };

        self.quotes
            .put(&quote.id.to_string(), StoredQuote::new(quote.clone()))?;

        info!(
            quote_id = %quote.id,
            "💱 Quote: {} {} -> {} {} (after fees {})",
            quote.input_amount,
            quote.input_asset,
            quote.estimated_output,
            quote.output_asset,
            quote.final_output_after_fees
        );

        self.bus.emit(&EngineEvent::SwapQuote {
            quote_id: quote.id,
            estimated_output: quote.estimated_output,
        });

        Ok(quote)
    }

    fn stored(&self, quote_id: Uuid) -> AppResult<StoredQuote> {
        self.quotes
            .get(&quote_id.to_string())?
            .ok_or_else(|| QuoteError::NotFound(quote_id.to_string()).into())
    }

    pub fn get(&self, quote_id: Uuid) -> AppResult<Quote> {
        Ok(self.stored(quote_id)?.quote)
    }

    /// Validate a quote for execution and mark it used.
    ///
    /// A stale quote is rejected, never re-priced.
    pub fn redeem(&self, quote_id: Uuid) -> AppResult<Quote> {
        let result = {
            let key = quote_id.to_string();
            let slot = self.locks.slot(&key);
            let _guard = slot.lock();
            self.redeem_locked(&key, quote_id)
        };
        self.locks.prune();
        result
    }

    fn redeem_locked(&self, key: &str, quote_id: Uuid) -> AppResult<Quote> {
        let mut stored = self.stored(quote_id)?;

        if stored.is_redeemed() {
            return Err(QuoteError::QuoteAlreadyUsed.into());
        }

        let now = Utc::now();
        if stored.quote.is_expired(now) {
            warn!(quote_id = %quote_id, "Rejected expired quote");
            return Err(QuoteError::QuoteExpired.into());
        }

        stored.redeemed_at = Some(now);
        self.quotes.put(key, stored.clone())?;
        Ok(stored.quote)
    }

    /// Drop quotes that expired more than an hour before `now`; returns how many
    pub fn evict_expired(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let cutoff = now - chrono::Duration::minutes(QUOTE_RETENTION_MINUTES);
        let mut evicted = 0;

        for stored in self.quotes.values()? {
            if stored.quote.expires_at <= cutoff {
                self.quotes.delete(&stored.quote.id.to_string())?;
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(evicted, "Evicted expired quotes");
        }
        Ok(evicted)
    }
}
