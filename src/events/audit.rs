use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{topics, Event, EventBus, EventHandler, Subscription};

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub event_id: Uuid,
    pub topic: String,
    pub source_module: String,
    pub correlation_id: Option<String>,
    pub details: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded audit log fed by a wildcard subscription
pub struct AuditTrail {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe a new trail to every topic on `bus`
    pub fn attach(bus: &EventBus, capacity: usize) -> (Arc<Self>, Subscription) {
        let trail = Arc::new(Self::new(capacity));
        let subscription = bus.subscribe(topics::ALL, trail.clone(), "audit_trail");
        (trail, subscription)
    }

    fn record(&self, event: &Event) {
        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(AuditEntry {
            event_id: event.id,
            topic: event.topic.clone(),
            source_module: event.source_module.clone(),
            correlation_id: event.correlation_id.clone(),
            details: event.data.clone(),
            emitted_at: event.emitted_at,
            recorded_at: Utc::now(),
        });
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn entries_for(&self, topic: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    pub fn entries_for_correlation(&self, correlation_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .collect()
    }

    pub fn count(&self, topic: &str) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.topic == topic)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl EventHandler for AuditTrail {
    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        info!(
            topic = %event.topic,
            source = %event.source_module,
            correlation_id = ?event.correlation_id,
            "📝 {}",
            event.data
        );
        self.record(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::eventually;

    #[tokio::test]
    async fn test_trail_records_all_topics() {
        let bus = EventBus::new();
        let (trail, _subscription) = AuditTrail::attach(&bus, 10);

        bus.publish("wallet.registered", "test", serde_json::json!({}), Some("alice".into()));
        bus.publish("transaction.created", "test", serde_json::json!({}), None);

        eventually(|| trail.len() == 2).await;
        assert_eq!(trail.count("wallet.registered"), 1);
        assert_eq!(trail.entries_for_correlation("alice").len(), 1);
        assert_eq!(trail.recent(1)[0].topic, "transaction.created");
    }

    #[tokio::test]
    async fn test_trail_is_bounded() {
        let bus = EventBus::new();
        let (trail, _subscription) = AuditTrail::attach(&bus, 3);

        for _ in 0..5 {
            bus.publish("swap.quote", "test", serde_json::json!({}), None);
        }

        eventually(|| trail.recent(10).len() == 3).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(trail.len(), 3);
    }
}
