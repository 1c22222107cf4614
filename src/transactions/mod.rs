// Transfer, airdrop and swap requests and their lifecycle
pub mod models;
pub mod orchestrator;
pub mod state_machine;
pub mod tracker;

pub use models::{
    BatchOutcome, FailureReason, Recipient, SigningPayload, TransactionKind, TransactionRequest,
    TransactionStatus,
};
pub use orchestrator::TransactionOrchestrator;
pub use state_machine::{advance, Step, Transition};
pub use tracker::{NewRequest, RequestTracker, TransitionOutcome};
