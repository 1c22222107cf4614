use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::AppResult;

/// Conversion rates between assets
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Units of `quote` per unit of `base`, `None` when the pair is unknown
    async fn get_rate(&self, base: &str, quote: &str) -> AppResult<Option<Decimal>>;
}

/// Fixed rate table. Inverse pairs are derived on lookup.
#[derive(Default)]
pub struct StaticRateSource {
    rates: RwLock<HashMap<(String, String), Decimal>>,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, base: &str, quote: &str, rate: Decimal) -> Self {
        self.set_rate(base, quote, rate);
        self
    }

    pub fn set_rate(&self, base: &str, quote: &str, rate: Decimal) {
        self.rates
            .write()
            .insert((base.to_uppercase(), quote.to_uppercase()), rate);
    }
}

#[async_trait]
impl RateSource for StaticRateSource {
    async fn get_rate(&self, base: &str, quote: &str) -> AppResult<Option<Decimal>> {
        let base = base.to_uppercase();
        let quote = quote.to_uppercase();

        if base == quote {
            return Ok(Some(Decimal::ONE));
        }

        let rates = self.rates.read();
        if let Some(rate) = rates.get(&(base.clone(), quote.clone())) {
            return Ok(Some(*rate));
        }

        Ok(rates
            .get(&(quote, base))
            .filter(|r| !r.is_zero())
            .map(|r| Decimal::ONE / *r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_direct_and_inverse_rates() {
        let source = StaticRateSource::new().with_rate("SOL", "USDC", dec!(200));

        assert_eq!(source.get_rate("sol", "usdc").await.unwrap(), Some(dec!(200)));
        assert_eq!(source.get_rate("USDC", "SOL").await.unwrap(), Some(dec!(0.005)));
        assert_eq!(source.get_rate("SOL", "SOL").await.unwrap(), Some(Decimal::ONE));
        assert_eq!(source.get_rate("SOL", "BONK").await.unwrap(), None);
    }
}
