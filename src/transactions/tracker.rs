use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppResult, TransactionError};
use crate::events::{EngineEvent, EventBus};
use crate::store::{EntityStore, KeyedLocks};
use crate::transactions::models::{
    Recipient, TransactionKind, TransactionRequest, TransactionStatus,
};
use crate::transactions::state_machine::{advance, Step, Transition};

/// Fields supplied by the orchestrator when a request is created
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub kind: TransactionKind,
    pub from: String,
    pub from_address: String,
    pub to: Vec<Recipient>,
    pub asset: String,
    pub amount_requested: Decimal,
    pub amount_quoted: Option<Decimal>,
    pub quote_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(TransactionRequest),
    /// Request was already in the target state
    Unchanged(TransactionRequest),
}

impl TransitionOutcome {
    pub fn request(&self) -> &TransactionRequest {
        match self {
            TransitionOutcome::Applied(r) | TransitionOutcome::Unchanged(r) => r,
        }
    }

    pub fn into_request(self) -> TransactionRequest {
        match self {
            TransitionOutcome::Applied(r) | TransitionOutcome::Unchanged(r) => r,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

/// Owns stored `TransactionRequest`s and is the only place they change.
///
/// Transitions on one request are serialized through a per-request lock and
/// publish their event before the lock is released, so subscribers observe a
/// request's events in transition order.
pub struct RequestTracker {
    store: Arc<dyn EntityStore<TransactionRequest>>,
    locks: KeyedLocks,
    sequence: AtomicU64,
    bus: EventBus,
    expiry: chrono::Duration,
}

impl RequestTracker {
    pub fn new(
        store: Arc<dyn EntityStore<TransactionRequest>>,
        bus: EventBus,
        expiry: chrono::Duration,
    ) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            sequence: AtomicU64::new(0),
            bus,
            expiry,
        }
    }

    /// Store a new `pending` request and publish `transaction.created`
    pub fn create(&self, new: NewRequest) -> AppResult<TransactionRequest> {
        let now = Utc::now();
        let request = TransactionRequest {
            id: Uuid::new_v4(),
            kind: new.kind,
            from: new.from,
            from_address: new.from_address,
            to: new.to,
            asset: new.asset,
            amount_requested: new.amount_requested,
            amount_quoted: new.amount_quoted,
            quote_id: new.quote_id,
            status: TransactionStatus::Pending,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            signature: None,
            ledger_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            expires_at: now + self.expiry,
        };

        self.store.put(&request.id.to_string(), request.clone())?;

        info!(
            request_id = %request.id,
            kind = %request.kind,
            from = %request.from,
            recipients = request.to.len(),
            "🧾 Created {} request for {} {}",
            request.kind,
            request.amount_requested,
            request.asset
        );

        self.bus.emit(&EngineEvent::TransactionCreated {
            id: request.id,
            kind: request.kind,
        });

        Ok(request)
    }

    pub fn find(&self, id: Uuid) -> AppResult<Option<TransactionRequest>> {
        self.store.get(&id.to_string())
    }

    pub fn get(&self, id: Uuid) -> AppResult<TransactionRequest> {
        self.find(id)?
            .ok_or_else(|| TransactionError::NotFound(id.to_string()).into())
    }

    pub fn transition(&self, id: Uuid, transition: Transition) -> AppResult<TransitionOutcome> {
        self.transition_with(id, |_| Ok(transition))
    }

    /// Choose a transition from the current request state and apply it,
    /// all under the request's lock.
    ///
    /// `decide` may reject the call by returning an error; nothing changes
    /// in that case.
    pub fn transition_with<F>(&self, id: Uuid, decide: F) -> AppResult<TransitionOutcome>
    where
        F: FnOnce(&TransactionRequest) -> AppResult<Transition>,
    {
        let key = id.to_string();
        let slot = self.locks.slot(&key);
        let _guard = slot.lock();

        let mut request = self
            .store
            .get(&key)?
            .ok_or_else(|| TransactionError::NotFound(key.clone()))?;

        let transition = decide(&request)?;

        match advance(&mut request, &transition, Utc::now())? {
            Step::Unchanged => {
                debug!(
                    request_id = %id,
                    status = %request.status,
                    "Duplicate transition ignored"
                );
                Ok(TransitionOutcome::Unchanged(request))
            }
            Step::Applied(event) => {
                self.store.put(&key, request.clone())?;
                info!(request_id = %id, status = %request.status, "🔁 Request transitioned");
                self.bus.emit(&event);
                Ok(TransitionOutcome::Applied(request))
            }
        }
    }

    /// Owner's requests, most recent first
    pub fn list_for_owner(&self, owner_id: &str, limit: usize) -> AppResult<Vec<TransactionRequest>> {
        let mut requests: Vec<TransactionRequest> = self
            .store
            .values()?
            .into_iter()
            .filter(|r| r.from == owner_id)
            .collect();

        requests.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        requests.truncate(limit);
        Ok(requests)
    }

    /// Ids of `pending`/`approved` requests past their expiry
    pub fn expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        Ok(self
            .store
            .values()?
            .into_iter()
            .filter(|r| r.status.is_in_flight() && r.is_expired(now))
            .map(|r| r.id)
            .collect())
    }

    /// Drop lock slots for requests nobody is currently transitioning
    pub fn prune_locks(&self) {
        self.locks.prune();
    }
}
