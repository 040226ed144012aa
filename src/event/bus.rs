// ============================================================================
// Event Bus
// Post-commit publication of stored events to subscribers
// ============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::PublishError;
use crate::event::StoredEvent;

/// Delivery of committed events to interested parties. Publication happens
/// after the log append succeeds and is not transactional with it: consumers
/// must tolerate missed deliveries and re-derive from the log.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: &StoredEvent) -> Result<(), PublishError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventBus;

impl EventBus for NoOpEventBus {
    fn publish(&self, _event: &StoredEvent) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Emits each event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventBus;

impl EventBus for LoggingEventBus {
    fn publish(&self, event: &StoredEvent) -> Result<(), PublishError> {
        tracing::info!(
            entity_id = %event.entity_id,
            entity_kind = %event.entity_kind,
            event_type = %event.event_type,
            version = event.version,
            "event published"
        );
        Ok(())
    }
}

type Subscriber = Box<dyn Fn(&StoredEvent) + Send + Sync>;

/// Synchronous in-process bus with per-event-type subscribers. A `*`
/// subscription receives every event.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, event_type: &str, callback: F)
    where
        F: Fn(&StoredEvent) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(callback));
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: &StoredEvent) -> Result<(), PublishError> {
        let subscribers = self.subscribers.read();
        for key in [event.event_type.as_str(), "*"] {
            if let Some(list) = subscribers.get(key) {
                for callback in list {
                    callback(event);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stored(event_type: &str) -> StoredEvent {
        StoredEvent {
            entity_id: "e1".to_string(),
            entity_kind: "test".to_string(),
            event_type: event_type.to_string(),
            version: 1,
            recorded_at: Utc::now(),
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_subscribers_receive_matching_events() {
        let bus = InMemoryEventBus::new();
        let matched = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&matched);
        bus.subscribe("trade.settled", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&all);
        bus.subscribe("*", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&stored("trade.settled")).unwrap();
        bus.publish(&stored("trade.matched")).unwrap();

        assert_eq!(matched.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }
}
