// Lifecycle events published by the engine
pub mod audit;
pub mod bus;

pub use audit::{AuditEntry, AuditTrail};
pub use bus::{handler_fn, EventBus, EventHandler, Subscription};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transactions::models::{FailureReason, TransactionKind};

pub mod topics {
    pub const WALLET_REGISTERED: &str = "wallet.registered";
    pub const WALLET_REVOKED: &str = "wallet.revoked";
    pub const TRANSACTION_CREATED: &str = "transaction.created";
    pub const TRANSACTION_APPROVED: &str = "transaction.approved";
    pub const TRANSACTION_SIGNED: &str = "transaction.signed";
    pub const TRANSACTION_SUBMITTED: &str = "transaction.submitted";
    pub const TRANSACTION_CONFIRMED: &str = "transaction.confirmed";
    pub const TRANSACTION_FAILED: &str = "transaction.failed";
    pub const TIP_PENDING_RESOLVED: &str = "tip.pending.resolved";
    pub const SWAP_QUOTE: &str = "swap.quote";

    /// Subscribes to every topic
    pub const ALL: &str = "*";
}

/// A published event. Never mutated after publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub topic: String,
    pub source_module: String,
    pub data: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

/// Typed payloads for every topic the engine emits
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    WalletRegistered {
        owner_id: String,
        address: String,
    },
    WalletRevoked {
        owner_id: String,
        affected_pending_count: usize,
    },
    TransactionCreated {
        id: Uuid,
        kind: TransactionKind,
    },
    TransactionApproved {
        id: Uuid,
    },
    TransactionSigned {
        id: Uuid,
    },
    TransactionSubmitted {
        id: Uuid,
        signature: String,
    },
    TransactionConfirmed {
        id: Uuid,
        ledger_ref: String,
    },
    TransactionFailed {
        id: Uuid,
        reason: FailureReason,
    },
    PendingResolved {
        recipient_id: String,
        count: usize,
    },
    SwapQuote {
        quote_id: Uuid,
        estimated_output: Decimal,
    },
}

impl EngineEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            EngineEvent::WalletRegistered { .. } => topics::WALLET_REGISTERED,
            EngineEvent::WalletRevoked { .. } => topics::WALLET_REVOKED,
            EngineEvent::TransactionCreated { .. } => topics::TRANSACTION_CREATED,
            EngineEvent::TransactionApproved { .. } => topics::TRANSACTION_APPROVED,
            EngineEvent::TransactionSigned { .. } => topics::TRANSACTION_SIGNED,
            EngineEvent::TransactionSubmitted { .. } => topics::TRANSACTION_SUBMITTED,
            EngineEvent::TransactionConfirmed { .. } => topics::TRANSACTION_CONFIRMED,
            EngineEvent::TransactionFailed { .. } => topics::TRANSACTION_FAILED,
            EngineEvent::PendingResolved { .. } => topics::TIP_PENDING_RESOLVED,
            EngineEvent::SwapQuote { .. } => topics::SWAP_QUOTE,
        }
    }

    pub fn source_module(&self) -> &'static str {
        match self {
            EngineEvent::WalletRegistered { .. } | EngineEvent::WalletRevoked { .. } => {
                "wallet_registry"
            }
            EngineEvent::TransactionConfirmed { .. } | EngineEvent::TransactionFailed { .. } => {
                "settlement"
            }
            EngineEvent::PendingResolved { .. } => "pending_intents",
            EngineEvent::SwapQuote { .. } => "quote_engine",
            _ => "orchestrator",
        }
    }

    /// Request id for transaction events, recipient/owner id otherwise
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            EngineEvent::TransactionCreated { id, .. }
            | EngineEvent::TransactionApproved { id }
            | EngineEvent::TransactionSigned { id }
            | EngineEvent::TransactionSubmitted { id, .. }
            | EngineEvent::TransactionConfirmed { id, .. }
            | EngineEvent::TransactionFailed { id, .. } => Some(id.to_string()),
            EngineEvent::SwapQuote { quote_id, .. } => Some(quote_id.to_string()),
            EngineEvent::WalletRegistered { owner_id, .. }
            | EngineEvent::WalletRevoked { owner_id, .. } => Some(owner_id.clone()),
            EngineEvent::PendingResolved { recipient_id, .. } => Some(recipient_id.clone()),
        }
    }

    pub fn data(&self) -> serde_json::Value {
        match self {
            EngineEvent::WalletRegistered { owner_id, address } => serde_json::json!({
                "ownerId": owner_id,
                "address": address,
            }),
            EngineEvent::WalletRevoked {
                owner_id,
                affected_pending_count,
            } => serde_json::json!({
                "ownerId": owner_id,
                "affectedPendingCount": affected_pending_count,
            }),
            EngineEvent::TransactionCreated { id, kind } => serde_json::json!({
                "id": id,
                "kind": kind,
            }),
            EngineEvent::TransactionApproved { id } | EngineEvent::TransactionSigned { id } => {
                serde_json::json!({ "id": id })
            }
            EngineEvent::TransactionSubmitted { id, signature } => serde_json::json!({
                "id": id,
                "signature": signature,
            }),
            EngineEvent::TransactionConfirmed { id, ledger_ref } => serde_json::json!({
                "id": id,
                "ledgerRef": ledger_ref,
            }),
            EngineEvent::TransactionFailed { id, reason } => serde_json::json!({
                "id": id,
                "reason": reason.to_string(),
            }),
            EngineEvent::PendingResolved {
                recipient_id,
                count,
            } => serde_json::json!({
                "recipientId": recipient_id,
                "count": count,
            }),
            EngineEvent::SwapQuote {
                quote_id,
                estimated_output,
            } => serde_json::json!({
                "quoteId": quote_id,
                "estimatedOutput": estimated_output.to_string(),
            }),
        }
    }
}
