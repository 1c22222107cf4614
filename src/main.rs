use settlement_engine::{bootstrap, config::AppConfig, server, settlement::ExpirySweeper};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,settlement_engine=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("🚀 Starting settlement orchestration engine");

    let config = AppConfig::load()?;
    let state = bootstrap::initialize_app_state(&config).await?;

    let sweeper = ExpirySweeper::new(
        state.orchestrator.clone(),
        config.engine.expiry_sweep_interval(),
    )
    .start();

    let app = server::create_app(state);
    let result = server::run_server(app, &config.server.bind_address).await;

    sweeper.abort();
    result
}
