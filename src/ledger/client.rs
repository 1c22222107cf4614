use async_trait::async_trait;
use serde::Serialize;

use crate::error::LedgerError;

/// Recent ledger reference (blockhash) to embed in an unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceInfo {
    pub reference: String,
    pub last_valid_height: Option<u64>,
}

/// Status of a submitted signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed { ledger_ref: String },
    /// Seen or unknown, but not final yet
    Pending,
    /// Ledger processed the transaction and refused it
    Rejected { reason: String },
}

/// External ledger network. Never holds keys and never signs.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn latest_reference_info(&self) -> Result<ReferenceInfo, LedgerError>;

    async fn confirm(&self, signature: &str) -> Result<Confirmation, LedgerError>;
}
