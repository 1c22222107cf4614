use std::collections::HashMap;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::settlement::retry::{Backoff, RetryPolicy};

/// Environment variable prefix, e.g. `SETTLEMENT__ENGINE__SLIPPAGE_BPS=75`
const ENV_PREFIX: &str = "SETTLEMENT";
const CONFIG_FILE: &str = "settlement";

/// Upper bound for expiry and quote TTL windows (30 days)
const MAX_WINDOW_MS: u64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub ledger: LedgerConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Options recognized by the orchestration engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_transfer_amount: Decimal,
    pub max_transfer_amount: Decimal,
    /// Slippage tolerance applied to quotes (50 = 0.5%)
    pub slippage_bps: u32,
    /// Platform fee taken from the quoted output (100 = 1%)
    pub platform_fee_bps: u32,
    /// Network fee, denominated in `network_fee_asset`
    pub network_fee_units: Decimal,
    pub network_fee_asset: String,
    /// Ledger polls per submitted transaction. A "not final yet" answer uses
    /// up an attempt just like a timeout, so the defaults give a transaction
    /// roughly `count * delay` (about 6s) to land before it is reported as
    /// `ConfirmationTimeout`. Raise both on congested networks.
    pub confirmation_retry_count: u32,
    pub confirmation_retry_delay_ms: u64,
    pub confirmation_backoff: Backoff,
    pub request_expiry_ms: u64,
    pub quote_ttl_ms: u64,
    pub expiry_sweep_interval_ms: u64,
    pub supported_assets: Vec<String>,
    /// Asset used for prize distributions
    pub default_asset: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_transfer_amount: dec!(0.000001),
            max_transfer_amount: dec!(1000000),
            slippage_bps: 50,
            platform_fee_bps: 100,
            network_fee_units: dec!(0.000005),
            network_fee_asset: "SOL".to_string(),
            confirmation_retry_count: 3,
            confirmation_retry_delay_ms: 2_000,
            confirmation_backoff: Backoff::Fixed,
            request_expiry_ms: 15 * 60 * 1000,
            quote_ttl_ms: 30_000,
            expiry_sweep_interval_ms: 60_000,
            supported_assets: vec![
                "SOL".to_string(),
                "USDC".to_string(),
                "USDT".to_string(),
                "BONK".to_string(),
            ],
            default_asset: "SOL".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn is_supported_asset(&self, asset: &str) -> bool {
        self.supported_assets
            .iter()
            .any(|a| a.eq_ignore_ascii_case(asset))
    }

    pub fn request_expiry(&self) -> chrono::Duration {
        window(self.request_expiry_ms)
    }

    pub fn quote_ttl(&self) -> chrono::Duration {
        window(self.quote_ttl_ms)
    }

    /// Reject settings that would overflow timestamp arithmetic or make
    /// every transfer invalid
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        for (name, value) in [
            ("request_expiry_ms", self.request_expiry_ms),
            ("quote_ttl_ms", self.quote_ttl_ms),
        ] {
            if value > MAX_WINDOW_MS {
                return Err(config::ConfigError::Message(format!(
                    "engine.{} = {} exceeds the maximum of {} ms",
                    name, value, MAX_WINDOW_MS
                )));
            }
        }

        if self.min_transfer_amount > self.max_transfer_amount {
            return Err(config::ConfigError::Message(format!(
                "engine.min_transfer_amount ({}) is above engine.max_transfer_amount ({})",
                self.min_transfer_amount, self.max_transfer_amount
            )));
        }

        Ok(())
    }

    pub fn expiry_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_sweep_interval_ms)
    }

    pub fn confirmation_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.confirmation_retry_count.max(1),
            delay: Duration::from_millis(self.confirmation_retry_delay_ms),
            backoff: self.confirmation_backoff,
        }
    }
}

/// Milliseconds to a chrono window, clamped to `MAX_WINDOW_MS`
fn window(ms: u64) -> chrono::Duration {
    let ms = i64::try_from(ms.min(MAX_WINDOW_MS)).unwrap_or(i64::MAX);
    chrono::Duration::milliseconds(ms)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub hermes_url: String,
    pub cache_ttl_ms: u64,
    /// Asset symbol -> Pyth price feed id (USD denominated)
    pub feed_ids: HashMap<String, String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let mut feed_ids = HashMap::new();
        feed_ids.insert(
            "SOL".to_string(),
            "0xef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d".to_string(),
        );
        feed_ids.insert(
            "USDC".to_string(),
            "0xeaa020c61cc479712813461ce153894a96a6c00b21ed0cfc2798d1f9a9e9c94a".to_string(),
        );
        feed_ids.insert(
            "USDT".to_string(),
            "0x2b89b9dc8fdf9f34709a5b106b472f0f39bb6ca9ce04b0fd7f2e971688e2e53b".to_string(),
        );
        feed_ids.insert(
            "BONK".to_string(),
            "0x72b021217ca3fe68922a19aaf990109cb9d84e9ad004b4d2025ad6f529314419".to_string(),
        );

        Self {
            hermes_url: "https://hermes.pyth.network".to_string(),
            cache_ttl_ms: 5_000,
            feed_ids,
        }
    }
}

impl AppConfig {
    /// Defaults, then `settlement.toml` if present, then `SETTLEMENT__*` env vars
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.engine.validate()?;
        Ok(config)
    }
}
