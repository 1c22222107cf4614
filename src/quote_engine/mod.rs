pub mod engine;
pub mod hermes;
pub mod models;
pub mod price_cache;
pub mod rate_source;

pub use engine::QuoteEngine;
pub use hermes::HermesRateSource;
pub use models::{Quote, QuoteRequest, StoredQuote};
pub use price_cache::CachedRateSource;
pub use rate_source::{RateSource, StaticRateSource};
