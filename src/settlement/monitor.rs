use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ledger::{Confirmation, LedgerClient};
use crate::settlement::retry::RetryPolicy;
use crate::settlement::scheduler::Scheduler;
use crate::transactions::models::{FailureReason, TransactionStatus};
use crate::transactions::state_machine::Transition;
use crate::transactions::tracker::RequestTracker;

/// Watches submitted transactions until the ledger reports a final outcome.
///
/// One background task per watched request. A task only ever moves its
/// request out of `submitted`; the tracker's transition table guarantees the
/// terminal event fires at most once even if a watch is started twice.
pub struct SettlementMonitor {
    tracker: Arc<RequestTracker>,
    ledger: Arc<dyn LedgerClient>,
    scheduler: Arc<dyn Scheduler>,
    policy: RetryPolicy,
    watching: Mutex<HashSet<Uuid>>,
}

impl SettlementMonitor {
    pub fn new(
        tracker: Arc<RequestTracker>,
        ledger: Arc<dyn LedgerClient>,
        scheduler: Arc<dyn Scheduler>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            tracker,
            ledger,
            scheduler,
            policy,
            watching: Mutex::new(HashSet::new()),
        }
    }

    /// Start confirming `signature` for `request_id` in the background.
    ///
    /// Returns `false` when the request is already being watched or is no
    /// longer `submitted`.
    pub fn watch(self: &Arc<Self>, request_id: Uuid, signature: String) -> bool {
        if !self.watching.lock().insert(request_id) {
            debug!(request_id = %request_id, "Already watching request");
            return false;
        }

        // Re-read after claiming the slot: a finished watch releases its slot
        // only after recording the outcome.
        match self.tracker.find(request_id) {
            Ok(Some(request)) if request.status == TransactionStatus::Submitted => {}
            Ok(_) => {
                debug!(request_id = %request_id, "Request no longer submitted; not watching");
                self.watching.lock().remove(&request_id);
                return false;
            }
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Failed to load request for watch");
                self.watching.lock().remove(&request_id);
                return false;
            }
        }

        info!(
            request_id = %request_id,
            signature = %signature,
            max_attempts = self.policy.max_attempts,
            "👀 Watching submitted transaction"
        );

        let monitor = Arc::clone(self);
        self.scheduler.spawn(Box::pin(async move {
            monitor.run(request_id, &signature).await;
            monitor.watching.lock().remove(&request_id);
        }));

        true
    }

    /// Requests currently being watched
    pub fn in_flight(&self) -> Vec<Uuid> {
        self.watching.lock().iter().copied().collect()
    }

    pub fn is_watching(&self, request_id: Uuid) -> bool {
        self.watching.lock().contains(&request_id)
    }

    async fn run(&self, request_id: Uuid, signature: &str) {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.ledger.confirm(signature).await {
                Ok(Confirmation::Confirmed { ledger_ref }) => {
                    info!(request_id = %request_id, ledger_ref = %ledger_ref, attempts, "✅ Transaction confirmed");
                    self.finish(request_id, Transition::Confirm { ledger_ref });
                    return;
                }
                Ok(Confirmation::Rejected { reason }) => {
                    warn!(request_id = %request_id, reason = %reason, "❌ Ledger rejected transaction");
                    self.finish(
                        request_id,
                        Transition::Fail {
                            reason: FailureReason::LedgerRejected(reason),
                        },
                    );
                    return;
                }
                Ok(Confirmation::Pending) => {
                    debug!(request_id = %request_id, attempt = attempts, "Not final yet");
                }
                Err(e) => {
                    warn!(
                        request_id = %request_id,
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts,
                        transient = e.is_transient(),
                        error = %e,
                        "⚠️ Confirmation check failed"
                    );
                }
            }

            if !self.policy.has_attempts_left(attempts) {
                error!(request_id = %request_id, attempts, "⏱️ Confirmation retries exhausted");
                self.finish(
                    request_id,
                    Transition::Fail {
                        reason: FailureReason::ConfirmationTimeout,
                    },
                );
                return;
            }

            self.scheduler.sleep(self.policy.delay_for(attempts)).await;
        }
    }

    fn finish(&self, request_id: Uuid, transition: Transition) {
        if let Err(e) = self.tracker.transition(request_id, transition) {
            error!(request_id = %request_id, error = %e, "Failed to record settlement outcome");
        }
    }
}
