// Confirmation monitoring and background settlement tasks
pub mod monitor;
pub mod retry;
pub mod scheduler;

pub use monitor::SettlementMonitor;
pub use retry::{Backoff, RetryPolicy};
pub use scheduler::{ExpirySweeper, ImmediateScheduler, Scheduler, TokioScheduler};
