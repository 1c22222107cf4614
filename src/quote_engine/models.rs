use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Priced conversion offer. Never changed after it is generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: Uuid,
    pub input_asset: String,
    pub output_asset: String,
    pub input_amount: Decimal,
    /// Output units per input unit
    pub rate: Decimal,
    pub estimated_output: Decimal,
    pub min_output: Decimal,
    pub slippage_bps: u32,
    pub platform_fee_bps: u32,
    pub platform_fee: Decimal,
    /// Network fee in the native fee asset
    pub network_fee_units: Decimal,
    pub network_fee_in_output: Decimal,
    pub final_output_after_fees: Decimal,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A quote as kept by the engine, together with its single-use marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuote {
    pub quote: Quote,
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl StoredQuote {
    pub fn new(quote: Quote) -> Self {
        Self {
            quote,
            redeemed_at: None,
        }
    }

    pub fn is_redeemed(&self) -> bool {
        self.redeemed_at.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub input_asset: String,
    pub output_asset: String,
    pub input_amount: Decimal,
}
