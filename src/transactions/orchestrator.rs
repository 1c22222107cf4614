use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{AppResult, QuoteError, TransactionError};
use crate::ledger::LedgerClient;
use crate::pending::PendingIntentLedger;
use crate::quote_engine::QuoteEngine;
use crate::settlement::SettlementMonitor;
use crate::transactions::models::{
    BatchOutcome, FailureReason, Recipient, SigningPayload, TransactionKind, TransactionRequest,
    TransactionStatus,
};
use crate::transactions::state_machine::Transition;
use crate::transactions::tracker::{NewRequest, RequestTracker};
use crate::wallet::{WalletRegistry, WalletVerifier};

/// Builds transfer, airdrop and swap requests and drives them up to the
/// point where the settlement monitor takes over.
pub struct TransactionOrchestrator {
    config: Arc<EngineConfig>,
    registry: Arc<WalletRegistry>,
    quotes: Arc<QuoteEngine>,
    pending: Arc<PendingIntentLedger>,
    tracker: Arc<RequestTracker>,
    monitor: Arc<SettlementMonitor>,
    ledger: Arc<dyn LedgerClient>,
}

impl TransactionOrchestrator {
    pub fn new(
        config: Arc<EngineConfig>,
        registry: Arc<WalletRegistry>,
        quotes: Arc<QuoteEngine>,
        pending: Arc<PendingIntentLedger>,
        tracker: Arc<RequestTracker>,
        monitor: Arc<SettlementMonitor>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            registry,
            quotes,
            pending,
            tracker,
            monitor,
            ledger,
        }
    }

    fn check_amount(&self, amount: Decimal) -> Result<(), TransactionError> {
        let min = self.config.min_transfer_amount;
        let max = self.config.max_transfer_amount;
        if amount < min || amount > max {
            warn!("Rejected amount {} outside [{}, {}]", amount, min, max);
            return Err(TransactionError::AmountOutOfBounds { amount, min, max });
        }
        Ok(())
    }

    fn normalize_asset(&self, asset: &str) -> Result<String, QuoteError> {
        let asset = asset.trim().to_uppercase();
        if !self.config.is_supported_asset(&asset) {
            return Err(QuoteError::UnsupportedAsset(asset));
        }
        Ok(asset)
    }

    fn sender_address(&self, sender_id: &str) -> AppResult<String> {
        self.registry
            .lookup(sender_id)?
            .map(|wallet| wallet.address)
            .ok_or_else(|| TransactionError::SenderWalletMissing(sender_id.to_string()).into())
    }

    /// Single-recipient transfer. An unregistered recipient defers the
    /// transfer through the pending-intent ledger instead of failing it.
    pub fn create_transfer(
        &self,
        sender_id: &str,
        recipient_id: &str,
        amount: Decimal,
        asset: &str,
    ) -> AppResult<TransactionRequest> {
        if sender_id == recipient_id {
            return Err(TransactionError::SelfTransferNotAllowed.into());
        }
        self.check_amount(amount)?;
        let asset = self.normalize_asset(asset)?;
        let from_address = self.sender_address(sender_id)?;

        // Registration flushes the recipient's intents under the same slot,
        // so the wallet check and the queued intent cannot straddle it.
        self.pending.defer_with(recipient_id, || {
            let recipient_address = self.registry.lookup(recipient_id)?.map(|w| w.address);
            let deferred = recipient_address.is_none();

            let request = self.tracker.create(NewRequest {
                kind: TransactionKind::Transfer,
                from: sender_id.to_string(),
                from_address,
                to: vec![Recipient {
                    user_id: recipient_id.to_string(),
                    address: recipient_address,
                    amount,
                }],
                asset,
                amount_requested: amount,
                amount_quoted: None,
                quote_id: None,
            })?;

            let queued = deferred.then_some(request.id);
            Ok((request, queued))
        })
    }

    /// Split `recipient_ids` into registered (id, address) pairs and skipped ids.
    /// The sender is never paid from their own request.
    fn partition_recipients(
        &self,
        sender_id: &str,
        recipient_ids: &[String],
    ) -> AppResult<(Vec<(String, String)>, Vec<String>)> {
        let mut valid = Vec::new();
        let mut skipped = Vec::new();

        for recipient_id in recipient_ids {
            if recipient_id == sender_id {
                skipped.push(recipient_id.clone());
                continue;
            }
            match self.registry.lookup(recipient_id)? {
                Some(wallet) => valid.push((recipient_id.clone(), wallet.address)),
                None => skipped.push(recipient_id.clone()),
            }
        }

        Ok((valid, skipped))
    }

    fn create_batch(
        &self,
        sender_id: &str,
        recipient_ids: &[String],
        asset: &str,
        per_recipient: impl Fn(usize) -> Decimal,
    ) -> AppResult<BatchOutcome> {
        let asset = self.normalize_asset(asset)?;
        let from_address = self.sender_address(sender_id)?;

        let (valid, skipped) = self.partition_recipients(sender_id, recipient_ids)?;
        if valid.is_empty() {
            return Err(TransactionError::NoValidRecipients.into());
        }

        let per_recipient_amount = per_recipient(valid.len());
        self.check_amount(per_recipient_amount)?;

        let to: Vec<Recipient> = valid
            .into_iter()
            .map(|(user_id, address)| Recipient {
                user_id,
                address: Some(address),
                amount: per_recipient_amount,
            })
            .collect();
        let total = per_recipient_amount * Decimal::from(to.len());

        if !skipped.is_empty() {
            info!(sender = %sender_id, "⏭️ Skipping {} recipients without wallets", skipped.len());
        }

        let request = self.tracker.create(NewRequest {
            kind: TransactionKind::Airdrop,
            from: sender_id.to_string(),
            from_address,
            to,
            asset,
            amount_requested: total,
            amount_quoted: None,
            quote_id: None,
        })?;

        Ok(BatchOutcome {
            request,
            skipped_recipients: skipped,
            per_recipient_amount,
        })
    }

    /// Same amount to every registered recipient
    pub fn create_airdrop(
        &self,
        sender_id: &str,
        recipient_ids: &[String],
        amount_per_recipient: Decimal,
        asset: &str,
    ) -> AppResult<BatchOutcome> {
        self.create_batch(sender_id, recipient_ids, asset, |_| amount_per_recipient)
    }

    /// Equal split of `total_prize` over registered recipients, in the default asset
    pub fn create_prize_distribution(
        &self,
        host_id: &str,
        recipient_ids: &[String],
        total_prize: Decimal,
    ) -> AppResult<BatchOutcome> {
        if total_prize <= Decimal::ZERO {
            return Err(TransactionError::AmountOutOfBounds {
                amount: total_prize,
                min: self.config.min_transfer_amount,
                max: self.config.max_transfer_amount,
            }
            .into());
        }

        let asset = self.config.default_asset.clone();
        self.create_batch(host_id, recipient_ids, &asset, |count| {
            total_prize / Decimal::from(count)
        })
    }

    /// Swap request backed by a fresh quote; the output goes to the owner's own wallet
    pub fn create_swap(&self, owner_id: &str, quote_id: Uuid) -> AppResult<TransactionRequest> {
        let owner_address = self.sender_address(owner_id)?;
        let quote = self.quotes.redeem(quote_id)?;

        self.tracker.create(NewRequest {
            kind: TransactionKind::Swap,
            from: owner_id.to_string(),
            from_address: owner_address.clone(),
            to: vec![Recipient {
                user_id: owner_id.to_string(),
                address: Some(owner_address),
                amount: quote.final_output_after_fees,
            }],
            asset: quote.input_asset,
            amount_requested: quote.input_amount,
            amount_quoted: Some(quote.final_output_after_fees),
            quote_id: Some(quote.id),
        })
    }

    /// Owner approval. Binds recipient addresses registered since creation.
    pub fn approve(&self, request_id: Uuid, caller_id: &str) -> AppResult<TransactionRequest> {
        let now = Utc::now();

        let outcome = self.tracker.transition_with(request_id, |request| {
            if request.from != caller_id {
                return Err(TransactionError::Unauthorized.into());
            }

            match request.status {
                TransactionStatus::Pending => {}
                TransactionStatus::Failed
                    if request.failure_reason == Some(FailureReason::Expired) =>
                {
                    return Err(TransactionError::Expired.into());
                }
                // Approved is a duplicate; anything else is rejected by the table
                _ => {
                    return Ok(Transition::Approve {
                        addresses: HashMap::new(),
                    })
                }
            }

            if request.is_expired(now) {
                return Ok(Transition::Fail {
                    reason: FailureReason::Expired,
                });
            }

            let mut addresses = HashMap::new();
            for recipient in request.to.iter().filter(|r| r.address.is_none()) {
                match self.registry.lookup(&recipient.user_id)? {
                    Some(wallet) => {
                        addresses.insert(recipient.user_id.clone(), wallet.address);
                    }
                    None => {
                        return Err(
                            TransactionError::RecipientWalletMissing(recipient.user_id.clone())
                                .into(),
                        )
                    }
                }
            }

            Ok(Transition::Approve { addresses })
        })?;

        let request = outcome.into_request();
        if request.status == TransactionStatus::Failed {
            info!(request_id = %request_id, "⌛ Request expired before approval");
            return Err(TransactionError::Expired.into());
        }

        Ok(request)
    }

    /// Unsigned description for the external signer
    pub async fn signing_payload(&self, request_id: Uuid) -> AppResult<SigningPayload> {
        let request = self.tracker.get(request_id)?;
        if request.status != TransactionStatus::Approved {
            return Err(TransactionError::InvalidTransition {
                from: request.status,
                to: TransactionStatus::Signed,
            }
            .into());
        }

        let reference = self.ledger.latest_reference_info().await?;

        Ok(SigningPayload {
            request_id: request.id,
            kind: request.kind,
            from_address: request.from_address.clone(),
            asset: request.asset.clone(),
            transfers: request
                .to
                .iter()
                .map(|r| (r.address.clone().unwrap_or_default(), r.amount))
                .collect(),
            reference_block: Some(reference.reference),
            expires_at: request.expires_at,
        })
    }

    /// Record the externally produced signature and hand the request to the monitor
    pub fn submit_signature(
        &self,
        request_id: Uuid,
        signature: &str,
    ) -> AppResult<TransactionRequest> {
        WalletVerifier::validate_signature(signature)?;

        self.tracker.transition_with(request_id, |request| {
            Ok(match request.status {
                TransactionStatus::Approved => Transition::Sign {
                    signature: signature.to_string(),
                },
                _ => Transition::Submit,
            })
        })?;

        let request = self
            .tracker
            .transition(request_id, Transition::Submit)?
            .into_request();

        // A concurrent call may have applied Submit first; the watch is
        // deduplicated, so every caller that sees `submitted` hands it off.
        if request.status == TransactionStatus::Submitted {
            if let Some(signature) = request.signature.clone() {
                self.monitor.watch(request.id, signature);
            }
        }

        Ok(request)
    }

    /// Owner cancellation while `pending` or `approved`
    pub fn cancel(&self, request_id: Uuid, caller_id: &str) -> AppResult<TransactionRequest> {
        let outcome = self.tracker.transition_with(request_id, |request| {
            if request.from != caller_id {
                return Err(TransactionError::Unauthorized.into());
            }
            Ok(Transition::Fail {
                reason: FailureReason::Cancelled,
            })
        })?;

        if outcome.was_applied() {
            info!(request_id = %request_id, "🚫 Request cancelled");
        }
        Ok(outcome.into_request())
    }

    pub fn get(&self, request_id: Uuid) -> AppResult<TransactionRequest> {
        self.tracker.get(request_id)
    }

    pub fn list_for_owner(&self, owner_id: &str, limit: usize) -> AppResult<Vec<TransactionRequest>> {
        self.tracker.list_for_owner(owner_id, limit)
    }

    /// Fail every expired `pending`/`approved` request; returns how many changed
    pub fn sweep_expired(&self) -> AppResult<usize> {
        let now = Utc::now();
        let mut expired = 0;

        for request_id in self.tracker.expired(now)? {
            let result = self.tracker.transition(
                request_id,
                Transition::Fail {
                    reason: FailureReason::Expired,
                },
            );

            match result {
                Ok(outcome) if outcome.was_applied() => expired += 1,
                Ok(_) => {}
                // Raced with a submit; the monitor owns it now
                Err(e) => debug!(request_id = %request_id, "Skipped expiry: {}", e),
            }
        }

        self.tracker.prune_locks();
        self.quotes.evict_expired(now)?;
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, WalletError};
    use crate::events::{topics, EventBus};
    use crate::ledger::Confirmation;
    use crate::pending::PendingIntent;
    use crate::quote_engine::{StaticRateSource, StoredQuote};
    use crate::settlement::{ImmediateScheduler, RetryPolicy};
    use crate::store::InMemoryStore;
    use crate::test_support::{eventually, EventRecorder, ScriptedLedger};
    use crate::wallet::Wallet;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Harness {
        bus: EventBus,
        registry: Arc<WalletRegistry>,
        pending: Arc<PendingIntentLedger>,
        quotes: Arc<QuoteEngine>,
        tracker: Arc<RequestTracker>,
        orchestrator: Arc<TransactionOrchestrator>,
    }

    fn harness_with(config: EngineConfig, ledger: Arc<ScriptedLedger>) -> Harness {
        let bus = EventBus::new();
        let config = Arc::new(config);
        let request_store = Arc::new(InMemoryStore::<TransactionRequest>::new());
        let pending = Arc::new(PendingIntentLedger::new(
            Arc::new(InMemoryStore::<Vec<PendingIntent>>::new()),
            bus.clone(),
        ));
        let registry = Arc::new(WalletRegistry::new(
            Arc::new(InMemoryStore::<Wallet>::new()),
            request_store.clone(),
            pending.clone(),
            bus.clone(),
        ));
        let quotes = Arc::new(QuoteEngine::new(
            config.clone(),
            Arc::new(StaticRateSource::new().with_rate("SOL", "USDC", dec!(100))),
            Arc::new(InMemoryStore::<StoredQuote>::new()),
            bus.clone(),
        ));
        let tracker = Arc::new(RequestTracker::new(request_store, bus.clone(), config.request_expiry()));
        let monitor = Arc::new(SettlementMonitor::new(
            tracker.clone(),
            ledger.clone(),
            Arc::new(ImmediateScheduler),
            RetryPolicy::fixed(3, Duration::from_millis(1)),
        ));
        let orchestrator = Arc::new(TransactionOrchestrator::new(
            config,
            registry.clone(),
            quotes.clone(),
            pending.clone(),
            tracker.clone(),
            monitor,
            ledger,
        ));

        Harness {
            bus,
            registry,
            pending,
            quotes,
            tracker,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(
            EngineConfig::default(),
            Arc::new(ScriptedLedger::repeating(Ok(Confirmation::Confirmed {
                ledger_ref: "ignored".into(),
            }))),
        )
    }

    fn address(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    fn signature(seed: u8) -> String {
        bs58::encode([seed; 64]).into_string()
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_transfer_validation() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();

        assert!(matches!(
            h.orchestrator.create_transfer("alice", "alice", dec!(1), "SOL"),
            Err(AppError::Transaction(TransactionError::SelfTransferNotAllowed))
        ));
        assert!(matches!(
            h.orchestrator.create_transfer("alice", "bob", dec!(0), "SOL"),
            Err(AppError::Transaction(TransactionError::AmountOutOfBounds { .. }))
        ));
        assert!(matches!(
            h.orchestrator.create_transfer("alice", "bob", dec!(5000000), "SOL"),
            Err(AppError::Transaction(TransactionError::AmountOutOfBounds { .. }))
        ));
        assert!(matches!(
            h.orchestrator.create_transfer("carol", "bob", dec!(1), "SOL"),
            Err(AppError::Transaction(TransactionError::SenderWalletMissing(_)))
        ));
        assert!(matches!(
            h.orchestrator.create_transfer("alice", "bob", dec!(1), "DOGE"),
            Err(AppError::Quote(QuoteError::UnsupportedAsset(_)))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_recipient_defers_transfer() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();

        let request = h.orchestrator.create_transfer("alice", "bob", dec!(5), "sol").unwrap();
        assert_eq!(request.status, TransactionStatus::Pending);
        assert_eq!(request.asset, "SOL");
        assert_eq!(h.pending.list_for("bob").unwrap().len(), 1);

        assert!(matches!(
            h.orchestrator.approve(request.id, "alice"),
            Err(AppError::Transaction(TransactionError::RecipientWalletMissing(_)))
        ));
        assert_eq!(h.orchestrator.get(request.id).unwrap().status, TransactionStatus::Pending);

        h.registry.register("bob", &address(2), "phantom").unwrap();
        let approved = h.orchestrator.approve(request.id, "alice").unwrap();
        assert_eq!(approved.status, TransactionStatus::Approved);
        assert_eq!(approved.to[0].address, Some(address(2)));
    }

    #[tokio::test]
    async fn test_airdrop_partitions_recipients() {
        let h = harness();
        h.registry.register("host", &address(1), "phantom").unwrap();
        h.registry.register("a", &address(2), "phantom").unwrap();
        h.registry.register("b", &address(3), "phantom").unwrap();

        let outcome = h
            .orchestrator
            .create_airdrop("host", &ids(&["a", "b", "c", "host", "a"]), dec!(2), "SOL")
            .unwrap();

        assert_eq!(outcome.skipped_recipients, ids(&["c", "host"]));
        assert_eq!(outcome.request.to.len(), 3);
        assert_eq!(outcome.request.amount_requested, dec!(6));
        assert_eq!(outcome.request.kind, TransactionKind::Airdrop);

        assert!(matches!(
            h.orchestrator.create_airdrop("host", &ids(&["c", "d"]), dec!(2), "SOL"),
            Err(AppError::Transaction(TransactionError::NoValidRecipients))
        ));
    }

    #[tokio::test]
    async fn test_prize_split_over_valid_recipients() {
        let h = harness();
        for (i, user) in ["host", "a", "b"].iter().enumerate() {
            h.registry.register(user, &address(i as u8 + 1), "phantom").unwrap();
        }

        let outcome = h
            .orchestrator
            .create_prize_distribution("host", &ids(&["a", "b", "c"]), dec!(10))
            .unwrap();

        assert_eq!(outcome.per_recipient_amount, dec!(5));
        assert_eq!(outcome.skipped_recipients, ids(&["c"]));
        assert_eq!(outcome.request.total_amount(), dec!(10));
        assert_eq!(outcome.request.asset, "SOL");
    }

    #[tokio::test]
    async fn test_approve_rules() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();

        assert!(matches!(
            h.orchestrator.approve(request.id, "bob"),
            Err(AppError::Transaction(TransactionError::Unauthorized))
        ));

        let first = h.orchestrator.approve(request.id, "alice").unwrap();
        let second = h.orchestrator.approve(request.id, "alice").unwrap();
        assert_eq!(first.status, TransactionStatus::Approved);
        assert_eq!(second.updated_at, first.updated_at);

        assert!(matches!(
            h.orchestrator.approve(Uuid::new_v4(), "alice"),
            Err(AppError::Transaction(TransactionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_approve_after_expiry_fails_request() {
        let config = EngineConfig {
            request_expiry_ms: 0,
            ..EngineConfig::default()
        };
        let h = harness_with(
            config,
            Arc::new(ScriptedLedger::repeating(Ok(Confirmation::Pending))),
        );
        let recorder = EventRecorder::attach(&h.bus, topics::TRANSACTION_FAILED);
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(matches!(
            h.orchestrator.approve(request.id, "alice"),
            Err(AppError::Transaction(TransactionError::Expired))
        ));

        let failed = h.orchestrator.get(request.id).unwrap();
        assert_eq!(failed.status, TransactionStatus::Failed);
        assert_eq!(failed.failure_reason, Some(FailureReason::Expired));

        // Repeated approval reports the same outcome without another event
        assert!(h.orchestrator.approve(request.id, "alice").is_err());
        eventually(|| recorder.len() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(recorder.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_signature_hands_off_to_monitor() {
        let h = harness();
        let recorder = EventRecorder::attach(&h.bus, topics::TRANSACTION_CONFIRMED);
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();

        assert!(matches!(
            h.orchestrator.submit_signature(request.id, &signature(9)),
            Err(AppError::Transaction(TransactionError::InvalidTransition { .. }))
        ));

        h.orchestrator.approve(request.id, "alice").unwrap();
        let payload = h.orchestrator.signing_payload(request.id).await.unwrap();
        assert_eq!(payload.transfers, vec![(address(2), dec!(1))]);
        assert!(payload.reference_block.is_some());

        assert!(matches!(
            h.orchestrator.submit_signature(request.id, "bad signature"),
            Err(AppError::Transaction(TransactionError::InvalidSignature(_)))
        ));

        let submitted = h.orchestrator.submit_signature(request.id, &signature(9)).unwrap();
        assert_eq!(submitted.status, TransactionStatus::Submitted);
        assert_eq!(submitted.signature, Some(signature(9)));

        eventually(|| {
            h.orchestrator.get(request.id).unwrap().status == TransactionStatus::Confirmed
        })
        .await;
        eventually(|| recorder.len() == 1).await;
    }

    #[tokio::test]
    async fn test_cancel() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();
        h.orchestrator.approve(request.id, "alice").unwrap();

        assert!(matches!(
            h.orchestrator.cancel(request.id, "bob"),
            Err(AppError::Transaction(TransactionError::Unauthorized))
        ));

        let cancelled = h.orchestrator.cancel(request.id, "alice").unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Failed);
        assert_eq!(cancelled.failure_reason, Some(FailureReason::Cancelled));

        assert!(h.orchestrator.submit_signature(request.id, &signature(3)).is_err());
    }

    #[tokio::test]
    async fn test_swap_consumes_quote() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        let quote = h.quotes.quote("SOL", "USDC", dec!(1)).await.unwrap();

        assert!(matches!(
            h.orchestrator.create_swap("bob", quote.id),
            Err(AppError::Transaction(TransactionError::SenderWalletMissing(_)))
        ));

        let swap = h.orchestrator.create_swap("alice", quote.id).unwrap();
        assert_eq!(swap.kind, TransactionKind::Swap);
        assert_eq!(swap.amount_requested, dec!(1));
        assert_eq!(swap.amount_quoted, Some(quote.final_output_after_fees));

        assert!(matches!(
            h.orchestrator.create_swap("alice", quote.id),
            Err(AppError::Quote(QuoteError::QuoteAlreadyUsed))
        ));
    }

    #[tokio::test]
    async fn test_sweep_expired_and_listing() {
        let config = EngineConfig {
            request_expiry_ms: 0,
            ..EngineConfig::default()
        };
        let h = harness_with(
            config,
            Arc::new(ScriptedLedger::repeating(Ok(Confirmation::Pending))),
        );
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let first = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();
        let second = h.orchestrator.create_transfer("alice", "bob", dec!(2), "SOL").unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(h.orchestrator.sweep_expired().unwrap(), 2);
        assert_eq!(h.orchestrator.sweep_expired().unwrap(), 0);

        let listed = h.orchestrator.list_for_owner("alice", 10).unwrap();
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![second.id, first.id]);
        assert!(listed.iter().all(|r| r.status == TransactionStatus::Failed));
    }

    #[tokio::test]
    async fn test_revocation_counts_in_flight_requests() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();
        h.orchestrator.create_transfer("alice", "carol", dec!(1), "SOL").unwrap();

        let result = h.registry.revoke("alice").unwrap();
        assert_eq!(result.affected_pending_count, 2);
        assert!(matches!(
            h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL"),
            Err(AppError::Transaction(TransactionError::SenderWalletMissing(_)))
        ));
        assert!(matches!(
            h.registry.revoke("alice"),
            Err(AppError::Wallet(WalletError::WalletNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_submit_from_signed_state_starts_watch() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();
        let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();
        h.orchestrator.approve(request.id, "alice").unwrap();
        h.tracker
            .transition(request.id, Transition::Sign { signature: signature(5) })
            .unwrap();

        let submitted = h.orchestrator.submit_signature(request.id, &signature(5)).unwrap();
        assert_eq!(submitted.status, TransactionStatus::Submitted);

        eventually(|| {
            h.orchestrator.get(request.id).unwrap().status == TransactionStatus::Confirmed
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_never_strand_a_request() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();
        h.registry.register("bob", &address(2), "phantom").unwrap();

        let mut ids = Vec::new();
        for _ in 0..200 {
            let request = h.orchestrator.create_transfer("alice", "bob", dec!(1), "SOL").unwrap();
            h.orchestrator.approve(request.id, "alice").unwrap();
            ids.push(request.id);
        }

        let mut tasks = Vec::new();
        for id in ids.iter().copied() {
            for _ in 0..2 {
                let orchestrator = h.orchestrator.clone();
                tasks.push(tokio::task::spawn_blocking(move || {
                    orchestrator.submit_signature(id, &signature(6))
                }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        eventually(|| {
            ids.iter().all(|id| {
                h.orchestrator.get(*id).unwrap().status == TransactionStatus::Confirmed
            })
        })
        .await;
    }

    #[test]
    fn test_registration_racing_transfer_never_strands_intent() {
        let h = harness();
        h.registry.register("alice", &address(1), "phantom").unwrap();

        for round in 0..300 {
            let recipient = format!("user-{}", round);

            let request = std::thread::scope(|scope| {
                let transfer = scope.spawn(|| {
                    h.orchestrator
                        .create_transfer("alice", &recipient, dec!(1), "SOL")
                        .unwrap()
                });
                let register = scope.spawn(|| {
                    h.registry.register(&recipient, &address(2), "phantom").unwrap()
                });
                register.join().unwrap();
                transfer.join().unwrap()
            });

            assert!(
                h.pending.list_for(&recipient).unwrap().is_empty(),
                "{} kept a pending intent after registering",
                recipient
            );
            let approved = h.orchestrator.approve(request.id, "alice").unwrap();
            assert_eq!(approved.to[0].address, Some(address(2)));
        }
    }

    #[tokio::test]
    async fn test_uneven_prize_split_conserves_total() {
        let h = harness();
        for (i, user) in ["host", "a", "b", "c"].iter().enumerate() {
            h.registry.register(user, &address(i as u8 + 1), "phantom").unwrap();
        }

        let outcome = h
            .orchestrator
            .create_prize_distribution("host", &ids(&["a", "b", "c"]), dec!(10))
            .unwrap();

        assert!(outcome.skipped_recipients.is_empty());
        assert!(outcome.request.to.iter().all(|r| r.amount == outcome.per_recipient_amount));

        let paid: Decimal = outcome.request.to.iter().map(|r| r.amount).sum();
        assert!(paid <= dec!(10));
        assert!(dec!(10) - paid < dec!(0.000001));
        assert_eq!(outcome.request.amount_requested, paid);
    }

    #[tokio::test]
    async fn test_sweep_keeps_recently_expired_quotes() {
        let config = EngineConfig {
            quote_ttl_ms: 0,
            ..EngineConfig::default()
        };
        let h = harness_with(
            config,
            Arc::new(ScriptedLedger::repeating(Ok(Confirmation::Pending))),
        );
        let quote = h.quotes.quote("SOL", "USDC", dec!(1)).await.unwrap();

        // Expired quotes stay retrievable for a while so callers see QuoteExpired
        h.orchestrator.sweep_expired().unwrap();
        assert_eq!(h.quotes.get(quote.id).unwrap(), quote);
        assert!(matches!(
            h.quotes.redeem(quote.id),
            Err(AppError::Quote(QuoteError::QuoteExpired))
        ));
    }
}
