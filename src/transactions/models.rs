use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Airdrop,
    Swap,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::Transfer => "transfer",
            TransactionKind::Airdrop => "airdrop",
            TransactionKind::Swap => "swap",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Approved,
    Signed,
    Submitted,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Approved => "approved",
            TransactionStatus::Signed => "signed",
            TransactionStatus::Submitted => "submitted",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Confirmed | TransactionStatus::Failed)
    }

    /// Not yet handed to the ledger; revocation and cancellation apply
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Approved)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a request ended in `failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail")]
pub enum FailureReason {
    ConfirmationTimeout,
    LedgerRejected(String),
    Expired,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ConfirmationTimeout => write!(f, "ConfirmationTimeout"),
            FailureReason::LedgerRejected(reason) => write!(f, "LedgerRejected: {}", reason),
            FailureReason::Expired => write!(f, "Expired"),
            FailureReason::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    /// Absent while the recipient has no registered wallet
    pub address: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub id: Uuid,
    pub kind: TransactionKind,
    /// Owner of the request (sender / host / swapper)
    pub from: String,
    pub from_address: String,
    pub to: Vec<Recipient>,
    pub asset: String,
    pub amount_requested: Decimal,
    pub amount_quoted: Option<Decimal>,
    pub quote_id: Option<Uuid>,
    pub status: TransactionStatus,
    pub sequence: u64,
    pub signature: Option<String>,
    pub ledger_ref: Option<String>,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TransactionRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.from == user_id || self.to.iter().any(|r| r.user_id == user_id)
    }

    /// Sum of all per-recipient amounts
    pub fn total_amount(&self) -> Decimal {
        self.to.iter().map(|r| r.amount).sum()
    }

    pub fn unresolved_recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .filter(|r| r.address.is_none())
            .map(|r| r.user_id.clone())
            .collect()
    }
}

/// Result of a multi-recipient request
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub request: TransactionRequest,
    pub skipped_recipients: Vec<String>,
    pub per_recipient_amount: Decimal,
}

/// Unsigned description handed to the external signer
#[derive(Debug, Clone, Serialize)]
pub struct SigningPayload {
    pub request_id: Uuid,
    pub kind: TransactionKind,
    pub from_address: String,
    pub asset: String,
    pub transfers: Vec<(String, Decimal)>,
    pub reference_block: Option<String>,
    pub expires_at: DateTime<Utc>,
}
