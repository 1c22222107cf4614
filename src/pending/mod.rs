// Transfers waiting on a recipient who has not registered a wallet yet

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppResult;
use crate::events::{EngineEvent, EventBus};
use crate::store::{EntityStore, KeyedLocks};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIntent {
    pub recipient_id: String,
    pub transaction_request_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Intents keyed by recipient. Mutations are serialized per recipient.
pub struct PendingIntentLedger {
    store: Arc<dyn EntityStore<Vec<PendingIntent>>>,
    locks: KeyedLocks,
    bus: EventBus,
}

impl PendingIntentLedger {
    pub fn new(store: Arc<dyn EntityStore<Vec<PendingIntent>>>, bus: EventBus) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
            bus,
        }
    }

    pub fn add(&self, recipient_id: &str, request_id: Uuid) -> AppResult<PendingIntent> {
        let intent = {
            let slot = self.locks.slot(recipient_id);
            let _guard = slot.lock();
            self.push_locked(recipient_id, request_id)
        };
        self.locks.prune();
        intent
    }

    /// Run `create` while holding the recipient's slot and queue the request
    /// id it hands back, if any.
    ///
    /// A `resolve` for the same recipient cannot run in between, so a caller
    /// that checks for the recipient's wallet inside `create` never queues an
    /// intent after the registration flush.
    pub fn defer_with<T, F>(&self, recipient_id: &str, create: F) -> AppResult<T>
    where
        F: FnOnce() -> AppResult<(T, Option<Uuid>)>,
    {
        let result = {
            let slot = self.locks.slot(recipient_id);
            let _guard = slot.lock();

            create().and_then(|(value, deferred)| {
                if let Some(request_id) = deferred {
                    self.push_locked(recipient_id, request_id)?;
                }
                Ok(value)
            })
        };
        self.locks.prune();
        result
    }

    fn push_locked(&self, recipient_id: &str, request_id: Uuid) -> AppResult<PendingIntent> {
        let intent = PendingIntent {
            recipient_id: recipient_id.to_string(),
            transaction_request_id: request_id,
            created_at: Utc::now(),
        };

        let mut intents = self.store.get(recipient_id)?.unwrap_or_default();
        intents.push(intent.clone());
        self.store.put(recipient_id, intents)?;

        info!(
            recipient_id = %recipient_id,
            request_id = %request_id,
            "⏳ Queued pending intent for unregistered recipient"
        );

        Ok(intent)
    }

    /// Clear the recipient's queue; publishes `tip.pending.resolved` when it held anything
    pub fn resolve(&self, recipient_id: &str) -> AppResult<usize> {
        let count = {
            let slot = self.locks.slot(recipient_id);
            let _guard = slot.lock();

            let count = self
                .store
                .delete(recipient_id)?
                .map(|intents| intents.len())
                .unwrap_or(0);

            if count > 0 {
                info!(recipient_id = %recipient_id, count, "📬 Resolved pending intents");
                self.bus.emit(&EngineEvent::PendingResolved {
                    recipient_id: recipient_id.to_string(),
                    count,
                });
            }

            count
        };
        self.locks.prune();
        Ok(count)
    }

    pub fn list_for(&self, recipient_id: &str) -> AppResult<Vec<PendingIntent>> {
        Ok(self.store.get(recipient_id)?.unwrap_or_default())
    }
}
