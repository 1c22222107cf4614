use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult, WalletError};
use crate::events::{EngineEvent, EventBus};
use crate::pending::PendingIntentLedger;
use crate::store::{EntityStore, KeyedLocks};
use crate::transactions::models::TransactionRequest;
use crate::wallet::models::{RevocationResult, Wallet};
use crate::wallet::verifier::WalletVerifier;

/// Owner -> wallet mapping. At most one wallet per owner.
pub struct WalletRegistry {
    wallets: Arc<dyn EntityStore<Wallet>>,
    requests: Arc<dyn EntityStore<TransactionRequest>>,
    pending: Arc<PendingIntentLedger>,
    locks: KeyedLocks,
    bus: EventBus,
}

impl WalletRegistry {
    pub fn new(
        wallets: Arc<dyn EntityStore<Wallet>>,
        requests: Arc<dyn EntityStore<TransactionRequest>>,
        pending: Arc<PendingIntentLedger>,
        bus: EventBus,
    ) -> Self {
        Self {
            wallets,
            requests,
            pending,
            locks: KeyedLocks::new(),
            bus,
        }
    }

    /// Register `address` for `owner_id`, then flush the owner's pending intents
    pub fn register(&self, owner_id: &str, address: &str, provider: &str) -> AppResult<Wallet> {
        if owner_id.trim().is_empty() {
            return Err(AppError::InvalidInput("Owner id cannot be empty".to_string()));
        }

        WalletVerifier::validate_address(address).map_err(|e| {
            warn!(owner_id = %owner_id, "Rejected wallet address: {}", e);
            e
        })?;

        let wallet = {
            let slot = self.locks.slot(owner_id);
            let _guard = slot.lock();
            self.insert_locked(owner_id, address, provider)
        };
        self.locks.prune();
        let wallet = wallet?;

        // Runs after the wallet is visible; see `PendingIntentLedger::defer_with`
        self.pending.resolve(owner_id)?;

        Ok(wallet)
    }

    fn insert_locked(&self, owner_id: &str, address: &str, provider: &str) -> AppResult<Wallet> {
        if self.wallets.get(owner_id)?.is_some() {
            return Err(WalletError::DuplicateWallet(owner_id.to_string()).into());
        }

        let wallet = Wallet {
            owner_id: owner_id.to_string(),
            address: address.to_string(),
            provider: provider.to_string(),
            registered_at: Utc::now(),
        };
        self.wallets.put(owner_id, wallet.clone())?;

        info!(owner_id = %owner_id, provider = %provider, "👛 Wallet registered: {}", address);

        self.bus.emit(&EngineEvent::WalletRegistered {
            owner_id: owner_id.to_string(),
            address: address.to_string(),
        });

        Ok(wallet)
    }

    pub fn lookup(&self, owner_id: &str) -> AppResult<Option<Wallet>> {
        self.wallets.get(owner_id)
    }

    /// Remove the owner's wallet immediately, reporting how much in-flight
    /// work still references it
    pub fn revoke(&self, owner_id: &str) -> AppResult<RevocationResult> {
        let result = {
            let slot = self.locks.slot(owner_id);
            let _guard = slot.lock();
            self.revoke_locked(owner_id)
        };
        self.locks.prune();
        result
    }

    fn revoke_locked(&self, owner_id: &str) -> AppResult<RevocationResult> {
        if self.wallets.get(owner_id)?.is_none() {
            return Err(WalletError::WalletNotFound(owner_id.to_string()).into());
        }

        let affected_pending_count = self
            .requests
            .values()?
            .iter()
            .filter(|r| r.status.is_in_flight() && r.involves(owner_id))
            .count();

        self.wallets.delete(owner_id)?;

        info!(
            owner_id = %owner_id,
            affected_pending_count,
            "🔌 Wallet revoked"
        );

        self.bus.emit(&EngineEvent::WalletRevoked {
            owner_id: owner_id.to_string(),
            affected_pending_count,
        });

        Ok(RevocationResult {
            success: true,
            affected_pending_count,
        })
    }
}
