// Timer abstraction for confirmation loops, plus the expiry sweep task

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::transactions::orchestrator::TransactionOrchestrator;

/// Runs background work and supplies waits between attempts.
///
/// The monitor never touches tokio timers directly so tests can swap in a
/// scheduler that does not sleep.
#[async_trait]
pub trait Scheduler: Send + Sync {
    fn spawn(&self, task: BoxFuture<'static, ()>);

    async fn sleep(&self, duration: Duration);
}

/// Production scheduler backed by the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Spawns tasks on tokio but skips every wait
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

#[async_trait]
impl Scheduler for ImmediateScheduler {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }

    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

/// Periodically fails `pending`/`approved` requests that outlived their expiry
pub struct ExpirySweeper {
    orchestrator: Arc<TransactionOrchestrator>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(orchestrator: Arc<TransactionOrchestrator>, period: Duration) -> Self {
        Self {
            orchestrator,
            period,
        }
    }

    /// Start the sweep loop (runs in background)
    pub fn start(self) -> JoinHandle<()> {
        info!("⏰ Expiry sweep every {:?}", self.period);

        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match self.orchestrator.sweep_expired() {
                    Ok(0) => {}
                    Ok(count) => info!("🧹 Expired {} stale requests", count),
                    Err(e) => error!("❌ Expiry sweep failed: {:?}", e),
                }
            }
        })
    }
}
