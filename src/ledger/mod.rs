// Abstracted access to the external ledger network
pub mod client;
pub mod rpc;

pub use client::{Confirmation, LedgerClient, ReferenceInfo};
pub use rpc::RpcLedgerClient;
