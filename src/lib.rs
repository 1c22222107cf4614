pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod events;
pub mod ledger;
pub mod pending;
pub mod quote_engine;
pub mod server;
pub mod settlement;
pub mod store;
pub mod transactions;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_support;
