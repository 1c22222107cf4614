use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's registered public address. The engine never sees private keys.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Wallet {
    pub owner_id: String,
    pub address: String,
    /// Wallet software the address came from (e.g. "phantom")
    pub provider: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevocationResult {
    pub success: bool,
    /// `pending`/`approved` requests involving the owner at revocation time
    pub affected_pending_count: usize,
}
