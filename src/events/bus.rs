use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{topics, EngineEvent, Event};

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync,
{
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.0)(event)
    }
}

/// Wrap a synchronous closure as an event handler
pub fn handler_fn<F>(f: F) -> Arc<dyn EventHandler>
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}

struct SubscriberEntry {
    id: u64,
    subscriber_id: String,
    topic: String,
    sender: mpsc::UnboundedSender<Arc<Event>>,
}

impl SubscriberEntry {
    fn matches(&self, topic: &str) -> bool {
        self.topic == topics::ALL || self.topic == topic
    }
}

struct BusInner {
    subscribers: RwLock<Vec<SubscriberEntry>>,
    // Held while fanning out so every subscriber sees one topic in the same order
    publish_lock: Mutex<()>,
    next_id: AtomicU64,
    published: AtomicU64,
}

/// In-process publish/subscribe backbone.
///
/// Each subscription owns a queue drained by its own task, so a slow or
/// failing handler never holds up the publisher or other subscribers.
/// Events are only delivered to subscriptions that existed at publish time.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

/// Handle returned by [`EventBus::subscribe`]
pub struct Subscription {
    id: u64,
    subscriber_id: String,
    topic: String,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop delivery; events already queued are still handled
    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.subscribers.write().retain(|s| s.id != self.id);
            debug!("🔕 {} unsubscribed from {}", self.subscriber_id, self.topic);
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                publish_lock: Mutex::new(()),
                next_id: AtomicU64::new(1),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Register `handler` for `topic` (or [`topics::ALL`]).
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn EventHandler>,
        subscriber_id: &str,
    ) -> Subscription {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Arc<Event>>();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);

        let name = subscriber_id.to_string();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let outcome = AssertUnwindSafe(handler.handle(&event))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(
                        subscriber = %name,
                        topic = %event.topic,
                        event_id = %event.id,
                        "Event handler error: {:?}",
                        e
                    ),
                    Err(_) => error!(
                        subscriber = %name,
                        topic = %event.topic,
                        event_id = %event.id,
                        "Event handler panicked"
                    ),
                }
            }
        });

        self.inner.subscribers.write().push(SubscriberEntry {
            id,
            subscriber_id: subscriber_id.to_string(),
            topic: topic.to_string(),
            sender,
        });

        debug!("🔔 {} subscribed to {}", subscriber_id, topic);

        Subscription {
            id,
            subscriber_id: subscriber_id.to_string(),
            topic: topic.to_string(),
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Publish raw event data; returns once the event is queued for every
    /// current subscriber of `topic`
    pub fn publish(
        &self,
        topic: &str,
        source_module: &str,
        data: serde_json::Value,
        correlation_id: Option<String>,
    ) -> Event {
        let event = Arc::new(Event {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            source_module: source_module.to_string(),
            data,
            emitted_at: Utc::now(),
            correlation_id,
        });

        let _ordered = self.inner.publish_lock.lock();
        let mut closed = Vec::new();
        {
            let subscribers = self.inner.subscribers.read();
            for subscriber in subscribers.iter().filter(|s| s.matches(topic)) {
                if subscriber.sender.send(event.clone()).is_err() {
                    closed.push(subscriber.id);
                }
            }
        }

        if !closed.is_empty() {
            warn!("Dropping {} closed subscriptions", closed.len());
            self.inner
                .subscribers
                .write()
                .retain(|s| !closed.contains(&s.id));
        }

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        debug!("📡 Published {} from {}", event.topic, event.source_module);

        (*event).clone()
    }

    /// Publish a typed engine event
    pub fn emit(&self, event: &EngineEvent) -> Event {
        self.publish(
            event.topic(),
            event.source_module(),
            event.data(),
            event.correlation_id(),
        )
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .subscribers
            .read()
            .iter()
            .filter(|s| s.matches(topic))
            .count()
    }

    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
