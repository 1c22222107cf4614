use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transactions::models::{BatchOutcome, TransactionRequest};

// ========== REQUEST MODELS ==========

/// POST /wallets
#[derive(Debug, Deserialize)]
pub struct RegisterWalletRequest {
    pub owner_id: String,
    pub address: String,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "unknown".to_string()
}

/// POST /transfers
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: Decimal,
    pub asset: String,
}

/// POST /airdrops
#[derive(Debug, Deserialize)]
pub struct AirdropRequest {
    pub sender_id: String,
    pub recipient_ids: Vec<String>,
    pub amount_per_recipient: Decimal,
    pub asset: String,
}

/// POST /prizes
#[derive(Debug, Deserialize)]
pub struct PrizeDistributionRequest {
    pub host_id: String,
    pub recipient_ids: Vec<String>,
    pub total_prize: Decimal,
}

/// POST /swaps
#[derive(Debug, Deserialize)]
pub struct SwapRequest {
    pub owner_id: String,
    pub quote_id: Uuid,
}

/// Body for owner-only actions (approve, cancel)
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub caller_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitSignatureRequest {
    pub signature: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

// ========== RESPONSE MODELS ==========

/// Multi-recipient creation result
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub request: TransactionRequest,
    pub skipped_recipients: Vec<String>,
    pub per_recipient_amount: String,
    pub total_amount: String,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            total_amount: outcome.request.total_amount().to_string(),
            per_recipient_amount: outcome.per_recipient_amount.to_string(),
            skipped_recipients: outcome.skipped_recipients,
            request: outcome.request,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub owner_id: String,
    pub count: usize,
    pub requests: Vec<TransactionRequest>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Submitted requests still awaiting a ledger outcome
    pub watching: usize,
    pub events_published: u64,
}
