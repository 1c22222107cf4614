//! Transition table for `TransactionRequest`.
//!
//! ```text
//! pending -> approved -> signed -> submitted -> confirmed
//! pending | approved -> failed   (expiry, cancellation)
//! submitted -> failed            (ledger rejection, confirmation timeout)
//! ```
//!
//! Every applied transition maps to exactly one [`EngineEvent`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::TransactionError;
use crate::events::EngineEvent;
use crate::transactions::models::{FailureReason, TransactionRequest, TransactionStatus};

use TransactionStatus::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Binds now-known recipient addresses (user id -> address)
    Approve { addresses: HashMap<String, String> },
    Sign { signature: String },
    Submit,
    Confirm { ledger_ref: String },
    Fail { reason: FailureReason },
}

impl Transition {
    pub fn target(&self) -> TransactionStatus {
        match self {
            Transition::Approve { .. } => Approved,
            Transition::Sign { .. } => Signed,
            Transition::Submit => Submitted,
            Transition::Confirm { .. } => Confirmed,
            Transition::Fail { .. } => Failed,
        }
    }

    pub fn allowed_from(&self) -> &'static [TransactionStatus] {
        match self {
            Transition::Approve { .. } => &[Pending],
            Transition::Sign { .. } => &[Approved],
            Transition::Submit => &[Signed],
            Transition::Confirm { .. } => &[Submitted],
            Transition::Fail { reason } => match reason {
                FailureReason::Expired | FailureReason::Cancelled => &[Pending, Approved],
                FailureReason::ConfirmationTimeout | FailureReason::LedgerRejected(_) => {
                    &[Submitted]
                }
            },
        }
    }

    pub fn event(&self, request: &TransactionRequest) -> EngineEvent {
        let id = request.id;
        match self {
            Transition::Approve { .. } => EngineEvent::TransactionApproved { id },
            Transition::Sign { .. } => EngineEvent::TransactionSigned { id },
            Transition::Submit => EngineEvent::TransactionSubmitted {
                id,
                signature: request.signature.clone().unwrap_or_default(),
            },
            Transition::Confirm { ledger_ref } => EngineEvent::TransactionConfirmed {
                id,
                ledger_ref: ledger_ref.clone(),
            },
            Transition::Fail { reason } => EngineEvent::TransactionFailed {
                id,
                reason: reason.clone(),
            },
        }
    }

    fn mutate(&self, request: &mut TransactionRequest) {
        match self {
            Transition::Approve { addresses } => {
                for recipient in request.to.iter_mut() {
                    if let Some(address) = addresses.get(&recipient.user_id) {
                        recipient.address = Some(address.clone());
                    }
                }
            }
            Transition::Sign { signature } => request.signature = Some(signature.clone()),
            Transition::Submit => {}
            Transition::Confirm { ledger_ref } => request.ledger_ref = Some(ledger_ref.clone()),
            Transition::Fail { reason } => request.failure_reason = Some(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The transition was applied; publish this event
    Applied(EngineEvent),
    /// Request already sits in the target state; nothing changes
    Unchanged,
}

/// Apply `transition` to `request` in place.
///
/// A transition into the state the request already holds is a no-op rather
/// than an error, so retried calls stay side-effect free.
pub fn advance(
    request: &mut TransactionRequest,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<Step, TransactionError> {
    let target = transition.target();

    if request.status == target {
        return Ok(Step::Unchanged);
    }

    if !transition.allowed_from().contains(&request.status) {
        return Err(TransactionError::InvalidTransition {
            from: request.status,
            to: target,
        });
    }

    transition.mutate(request);
    request.status = target;
    request.updated_at = now;

    Ok(Step::Applied(transition.event(request)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transactions::models::{Recipient, TransactionKind};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn request(status: TransactionStatus) -> TransactionRequest {
        let now = Utc::now();
        TransactionRequest {
            id: Uuid::new_v4(),
            kind: TransactionKind::Transfer,
            from: "S".into(),
            from_address: "Sx".into(),
            to: vec![Recipient { user_id: "R".into(), address: None, amount: dec!(5) }],
            asset: "SOL".into(),
            amount_requested: dec!(5),
            amount_quoted: None,
            quote_id: None,
            status,
            sequence: 1,
            signature: None,
            ledger_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
            expires_at: now,
        }
    }

    #[test]
    fn test_happy_path() {
        let mut req = request(Pending);
        let mut addresses = HashMap::new();
        addresses.insert("R".to_string(), "Rx".to_string());

        let steps = [
            Transition::Approve { addresses },
            Transition::Sign { signature: "sig".into() },
            Transition::Submit,
            Transition::Confirm { ledger_ref: "sig".into() },
        ];
        for t in steps.iter() {
            assert!(matches!(advance(&mut req, t, Utc::now()).unwrap(), Step::Applied(_)));
        }

        assert_eq!(req.status, Confirmed);
        assert_eq!(req.to[0].address.as_deref(), Some("Rx"));
        assert_eq!(req.ledger_ref.as_deref(), Some("sig"));
    }

    #[test]
    fn test_each_transition_emits_its_event() {
        let mut req = request(Submitted);
        req.signature = Some("sig".into());
        let step = advance(
            &mut req,
            &Transition::Fail { reason: FailureReason::ConfirmationTimeout },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(
            step,
            Step::Applied(EngineEvent::TransactionFailed {
                id: req.id,
                reason: FailureReason::ConfirmationTimeout,
            })
        );
    }

    #[test]
    fn test_duplicate_transition_is_noop() {
        let mut req = request(Approved);
        let before = req.updated_at;
        let step = advance(&mut req, &Transition::Approve { addresses: HashMap::new() }, Utc::now())
            .unwrap();
        assert_eq!(step, Step::Unchanged);
        assert_eq!(req.updated_at, before);
    }

    #[test]
    fn test_terminal_states_are_final() {
        for status in [Confirmed, Failed] {
            let mut req = request(status);
            let all = [
                Transition::Approve { addresses: HashMap::new() },
                Transition::Sign { signature: "s".into() },
                Transition::Submit,
                Transition::Confirm { ledger_ref: "s".into() },
                Transition::Fail { reason: FailureReason::ConfirmationTimeout },
            ];
            for t in all.iter() {
                let result = advance(&mut req, t, Utc::now());
                assert!(matches!(result, Err(_) | Ok(Step::Unchanged)));
                assert_eq!(req.status, status);
            }
        }
    }

    #[test]
    fn test_failure_reason_constrains_source_state() {
        let mut req = request(Submitted);
        let err = advance(&mut req, &Transition::Fail { reason: FailureReason::Cancelled }, Utc::now())
            .unwrap_err();
        assert_eq!(err, TransactionError::InvalidTransition { from: Submitted, to: Failed });

        let mut req = request(Pending);
        assert!(advance(
            &mut req,
            &Transition::Fail { reason: FailureReason::LedgerRejected("x".into()) },
            Utc::now()
        )
        .is_err());
        assert!(advance(&mut req, &Transition::Fail { reason: FailureReason::Expired }, Utc::now())
            .is_ok());
        assert_eq!(req.failure_reason, Some(FailureReason::Expired));
    }

    #[test]
    fn test_cannot_skip_states() {
        let mut req = request(Pending);
        assert!(advance(&mut req, &Transition::Submit, Utc::now()).is_err());
        assert!(advance(&mut req, &Transition::Confirm { ledger_ref: "x".into() }, Utc::now()).is_err());
        assert_eq!(req.status, Pending);
    }
}
