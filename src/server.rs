use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::{header, Method};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    approve_transaction, cancel_transaction, create_airdrop, create_prize_distribution,
    create_quote, create_swap, create_transfer, get_quote, get_signing_payload, get_transaction,
    get_wallet, health_check, list_pending_intents, list_transactions, recent_audit_entries,
    register_wallet, revoke_wallet, submit_signature, AppState,
};

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(60 * 60))
}

pub fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Wallet registry
                .route("/wallets", post(register_wallet))
                .route("/wallets/:owner_id", get(get_wallet).delete(revoke_wallet))
                // Quotes
                .route("/quotes", post(create_quote))
                .route("/quotes/:quote_id", get(get_quote))
                // Request creation
                .route("/transfers", post(create_transfer))
                .route("/airdrops", post(create_airdrop))
                .route("/prizes", post(create_prize_distribution))
                .route("/swaps", post(create_swap))
                // Request lifecycle
                .route("/transactions/:id", get(get_transaction))
                .route("/transactions/:id/approve", post(approve_transaction))
                .route("/transactions/:id/signing-payload", get(get_signing_payload))
                .route("/transactions/:id/signature", post(submit_signature))
                .route("/transactions/:id/cancel", post(cancel_transaction))
                .route("/owners/:owner_id/transactions", get(list_transactions))
                // Pending intents and audit
                .route("/pending/:recipient_id", get(list_pending_intents))
                .route("/audit", get(recent_audit_entries)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
