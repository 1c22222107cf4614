use std::sync::Arc;

use tracing::info;

use crate::{
    api::handler::AppState,
    config::AppConfig,
    error::AppResult,
    events::{AuditTrail, EventBus},
    ledger::{LedgerClient, RpcLedgerClient},
    pending::{PendingIntent, PendingIntentLedger},
    quote_engine::{CachedRateSource, HermesRateSource, QuoteEngine, RateSource, StoredQuote},
    settlement::{Scheduler, SettlementMonitor, TokioScheduler},
    store::InMemoryStore,
    transactions::{RequestTracker, TransactionOrchestrator, TransactionRequest},
    wallet::{Wallet, WalletRegistry},
};

const AUDIT_CAPACITY: usize = 10_000;

/// Build the engine against the configured oracle and ledger RPC endpoints
pub async fn initialize_app_state(config: &AppConfig) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let hermes: Arc<dyn RateSource> = Arc::new(HermesRateSource::new(&config.oracle)?);
    let rates = Arc::new(CachedRateSource::new(hermes, config.oracle.cache_ttl_ms));
    info!(
        "✅ Price oracle initialized: {} (cache ttl {}ms)",
        config.oracle.hermes_url, config.oracle.cache_ttl_ms
    );

    let ledger = Arc::new(RpcLedgerClient::new(&config.ledger)?);
    info!("✅ Ledger client initialized: {}", config.ledger.rpc_url);

    Ok(assemble(config, rates, ledger, Arc::new(TokioScheduler)))
}

/// Wire every component over fresh in-memory stores.
///
/// Must be called from within a tokio runtime.
pub fn assemble(
    config: &AppConfig,
    rates: Arc<dyn RateSource>,
    ledger: Arc<dyn LedgerClient>,
    scheduler: Arc<dyn Scheduler>,
) -> AppState {
    let engine_config = Arc::new(config.engine.clone());
    let bus = EventBus::new();

    // Lives as long as the bus; dropping the handle keeps the subscription
    let (audit, _) = AuditTrail::attach(&bus, AUDIT_CAPACITY);

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

    let quote_engine = Arc::new(QuoteEngine::new(
        engine_config.clone(),
        rates,
        Arc::new(InMemoryStore::<StoredQuote>::new()),
        bus.clone(),
    ));

    let tracker = Arc::new(RequestTracker::new(
        request_store,
        bus.clone(),
        engine_config.request_expiry(),
    ));

    let policy = engine_config.confirmation_retry_policy();
    let monitor = Arc::new(SettlementMonitor::new(
        tracker.clone(),
        ledger.clone(),
        scheduler,
        policy,
    ));
    info!(
        "✅ Settlement monitor ready ({} attempts, {:?} delay, {:?} backoff)",
        policy.max_attempts, policy.delay, policy.backoff
    );

    let orchestrator = Arc::new(TransactionOrchestrator::new(
        engine_config,
        registry.clone(),
        quote_engine.clone(),
        pending.clone(),
        tracker,
        monitor.clone(),
        ledger,
    ));

    info!("✅ All components initialized");

    AppState {
        bus,
        registry,
        quote_engine,
        orchestrator,
        pending,
        monitor,
        audit,
    }
}
