use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::models::*;
use crate::{
    error::{AppResult, WalletError},
    events::{AuditEntry, AuditTrail, EventBus},
    pending::{PendingIntent, PendingIntentLedger},
    quote_engine::{Quote, QuoteEngine, QuoteRequest},
    settlement::SettlementMonitor,
    transactions::{SigningPayload, TransactionOrchestrator, TransactionRequest},
    wallet::{RevocationResult, Wallet, WalletRegistry},
};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub bus: EventBus,
    pub registry: Arc<WalletRegistry>,
    pub quote_engine: Arc<QuoteEngine>,
    pub orchestrator: Arc<TransactionOrchestrator>,
    pub pending: Arc<PendingIntentLedger>,
    pub monitor: Arc<SettlementMonitor>,
    pub audit: Arc<AuditTrail>,
}

fn list_limit(query: &ListQuery) -> usize {
    query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        watching: state.monitor.in_flight().len(),
        events_published: state.bus.published_count(),
    })
}

// ========== WALLETS ==========

/// POST /wallets
pub async fn register_wallet(
    State(state): State<AppState>,
    Json(request): Json<RegisterWalletRequest>,
) -> AppResult<Json<Wallet>> {
    info!("Registering wallet for {}", request.owner_id);
    let wallet = state
        .registry
        .register(&request.owner_id, &request.address, &request.provider)?;
    Ok(Json(wallet))
}

/// GET /wallets/:owner_id
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> AppResult<Json<Wallet>> {
    let wallet = state
        .registry
        .lookup(&owner_id)?
        .ok_or(WalletError::WalletNotFound(owner_id))?;
    Ok(Json(wallet))
}

/// DELETE /wallets/:owner_id
pub async fn revoke_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> AppResult<Json<RevocationResult>> {
    Ok(Json(state.registry.revoke(&owner_id)?))
}

// ========== QUOTES ==========

/// POST /quotes
pub async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> AppResult<Json<Quote>> {
    let quote = state
        .quote_engine
        .quote(&request.input_asset, &request.output_asset, request.input_amount)
        .await?;
    Ok(Json(quote))
}

/// GET /quotes/:quote_id
pub async fn get_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
) -> AppResult<Json<Quote>> {
    Ok(Json(state.quote_engine.get(quote_id)?))
}

// ========== TRANSACTION CREATION ==========

/// POST /transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> AppResult<Json<TransactionRequest>> {
    let created = state.orchestrator.create_transfer(
        &request.sender_id,
        &request.recipient_id,
        request.amount,
        &request.asset,
    )?;
    Ok(Json(created))
}

/// POST /airdrops
pub async fn create_airdrop(
    State(state): State<AppState>,
    Json(request): Json<AirdropRequest>,
) -> AppResult<Json<BatchResponse>> {
    let outcome = state.orchestrator.create_airdrop(
        &request.sender_id,
        &request.recipient_ids,
        request.amount_per_recipient,
        &request.asset,
    )?;
    Ok(Json(outcome.into()))
}

/// POST /prizes
pub async fn create_prize_distribution(
    State(state): State<AppState>,
    Json(request): Json<PrizeDistributionRequest>,
) -> AppResult<Json<BatchResponse>> {
    let outcome = state.orchestrator.create_prize_distribution(
        &request.host_id,
        &request.recipient_ids,
        request.total_prize,
    )?;
    Ok(Json(outcome.into()))
}

/// POST /swaps
pub async fn create_swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> AppResult<Json<TransactionRequest>> {
    let created = state
        .orchestrator
        .create_swap(&request.owner_id, request.quote_id)?;
    Ok(Json(created))
}

// ========== TRANSACTION LIFECYCLE ==========

/// GET /transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TransactionRequest>> {
    Ok(Json(state.orchestrator.get(id)?))
}

/// POST /transactions/:id/approve
pub async fn approve_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CallerRequest>,
) -> AppResult<Json<TransactionRequest>> {
    Ok(Json(state.orchestrator.approve(id, &request.caller_id)?))
}

/// GET /transactions/:id/signing-payload
pub async fn get_signing_payload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SigningPayload>> {
    Ok(Json(state.orchestrator.signing_payload(id).await?))
}

/// POST /transactions/:id/signature
pub async fn submit_signature(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitSignatureRequest>,
) -> AppResult<Json<TransactionRequest>> {
    info!("Signature received for {}", id);
    Ok(Json(state.orchestrator.submit_signature(id, &request.signature)?))
}

/// POST /transactions/:id/cancel
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CallerRequest>,
) -> AppResult<Json<TransactionRequest>> {
    Ok(Json(state.orchestrator.cancel(id, &request.caller_id)?))
}

/// GET /owners/:owner_id/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let requests = state
        .orchestrator
        .list_for_owner(&owner_id, list_limit(&query))?;
    Ok(Json(TransactionListResponse {
        owner_id,
        count: requests.len(),
        requests,
    }))
}

// ========== PENDING INTENTS / AUDIT ==========

/// GET /pending/:recipient_id
pub async fn list_pending_intents(
    State(state): State<AppState>,
    Path(recipient_id): Path<String>,
) -> AppResult<Json<Vec<PendingIntent>>> {
    Ok(Json(state.pending.list_for(&recipient_id)?))
}

/// GET /audit
pub async fn recent_audit_entries(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<AuditEntry>> {
    Json(state.audit.recent(list_limit(&query)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::error::AppError;
    use crate::ledger::Confirmation;
    use crate::quote_engine::StaticRateSource;
    use crate::settlement::ImmediateScheduler;
    use crate::test_support::{eventually, ScriptedLedger};
    use crate::transactions::TransactionStatus;
    use rust_decimal_macros::dec;

    fn state() -> AppState {
        let ledger = Arc::new(ScriptedLedger::repeating(Ok(Confirmation::Confirmed {
            ledger_ref: "ref".into(),
        })));
        crate::bootstrap::assemble(
            &AppConfig::default(),
            Arc::new(StaticRateSource::new().with_rate("SOL", "USDC", dec!(100))),
            ledger,
            Arc::new(ImmediateScheduler),
        )
    }

    fn address(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    async fn register(state: &AppState, owner_id: &str, seed: u8) {
        register_wallet(
            State(state.clone()),
            Json(RegisterWalletRequest {
                owner_id: owner_id.into(),
                address: address(seed),
                provider: "phantom".into(),
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wallet_endpoints() {
        let state = state();
        register(&state, "alice", 1).await;

        let Json(wallet) = get_wallet(State(state.clone()), Path("alice".into()))
            .await
            .unwrap();
        assert_eq!(wallet.address, address(1));

        let missing = get_wallet(State(state.clone()), Path("bob".into())).await;
        assert!(matches!(
            missing,
            Err(AppError::Wallet(WalletError::WalletNotFound(_)))
        ));

        let Json(result) = revoke_wallet(State(state.clone()), Path("alice".into()))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_transfer_through_handlers() {
        let state = state();
        register(&state, "alice", 1).await;
        register(&state, "bob", 2).await;

        let Json(created) = create_transfer(
            State(state.clone()),
            Json(TransferRequest {
                sender_id: "alice".into(),
                recipient_id: "bob".into(),
                amount: dec!(1),
                asset: "sol".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(created.asset, "SOL");

        approve_transaction(
            State(state.clone()),
            Path(created.id),
            Json(CallerRequest { caller_id: "alice".into() }),
        )
        .await
        .unwrap();

        let signature = bs58::encode([7u8; 64]).into_string();
        submit_signature(
            State(state.clone()),
            Path(created.id),
            Json(SubmitSignatureRequest { signature }),
        )
        .await
        .unwrap();

        eventually(|| {
            state.orchestrator.get(created.id).unwrap().status == TransactionStatus::Confirmed
        })
        .await;

        let Json(listed) = list_transactions(
            State(state.clone()),
            Path("alice".into()),
            Query(ListQuery { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(listed.count, 1);

        eventually(|| !state.audit.is_empty()).await;
    }

    #[tokio::test]
    async fn test_prize_response_reports_skipped() {
        let state = state();
        register(&state, "host", 1).await;
        register(&state, "a", 2).await;

        let Json(response) = create_prize_distribution(
            State(state.clone()),
            Json(PrizeDistributionRequest {
                host_id: "host".into(),
                recipient_ids: vec!["a".into(), "ghost".into()],
                total_prize: dec!(4),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.skipped_recipients, vec!["ghost".to_string()]);
        assert_eq!(response.per_recipient_amount, "4");
    }
}
