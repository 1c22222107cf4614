// Shared fixtures for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::events::{handler_fn, Event, EventBus, Subscription};
use crate::ledger::{Confirmation, LedgerClient, ReferenceInfo};
use crate::transactions::models::{Recipient, TransactionKind};
use crate::transactions::state_machine::Transition;
use crate::transactions::tracker::{NewRequest, RequestTracker};

/// Poll `condition` until it holds, panicking after two seconds
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not met within 2s");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Ledger client answering from a script; the last answer repeats
pub struct ScriptedLedger {
    script: Mutex<VecDeque<Result<Confirmation, LedgerError>>>,
    last: Mutex<Result<Confirmation, LedgerError>>,
    calls: AtomicUsize,
}

impl ScriptedLedger {
    pub fn new(script: Vec<Result<Confirmation, LedgerError>>) -> Self {
        let last = script
            .last()
            .cloned()
            .unwrap_or(Ok(Confirmation::Pending));
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn repeating(answer: Result<Confirmation, LedgerError>) -> Self {
        Self::new(vec![answer])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn latest_reference_info(&self) -> Result<ReferenceInfo, LedgerError> {
        Ok(ReferenceInfo {
            reference: "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N".to_string(),
            last_valid_height: Some(100),
        })
    }

    async fn confirm(&self, _signature: &str) -> Result<Confirmation, LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(answer) => answer,
            None => self.last.lock().clone(),
        }
    }
}

/// Collects events for one topic
pub struct EventRecorder {
    events: Arc<Mutex<Vec<Event>>>,
    _subscription: Subscription,
}

impl EventRecorder {
    pub fn attach(bus: &EventBus, topic: &str) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = bus.subscribe(
            topic,
            handler_fn(move |event| {
                sink.lock().push(event.clone());
                Ok(())
            }),
            "recorder",
        );
        Self {
            events,
            _subscription: subscription,
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

/// Create a transfer and drive it to `submitted` with `signature`
pub fn submitted_request(tracker: &RequestTracker, signature: &str) -> Uuid {
    let request = tracker
        .create(NewRequest {
            kind: TransactionKind::Transfer,
            from: "sender".into(),
            from_address: "sender-address".into(),
            to: vec![Recipient {
                user_id: "recipient".into(),
                address: Some("recipient-address".into()),
                amount: dec!(1),
            }],
            asset: "SOL".into(),
            amount_requested: dec!(1),
            amount_quoted: None,
            quote_id: None,
        })
        .unwrap();

    for transition in [
        Transition::Approve { addresses: HashMap::new() },
        Transition::Sign { signature: signature.to_string() },
        Transition::Submit,
    ] {
        tracker.transition(request.id, transition).unwrap();
    }

    request.id
}
