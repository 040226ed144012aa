// ============================================================================
// Repository
// Snapshot-aware aggregate loading and event persistence
// ============================================================================

use std::sync::Arc;

use chrono::Utc;

use crate::domain::aggregate::{Aggregate, DomainEvent};
use crate::error::EventLogError;
use crate::event::bus::EventBus;
use crate::event::store::EventLog;
use crate::event::{Snapshot, StoredEvent};

/// Streams longer than this get a snapshot on write so later loads replay
/// only the tail.
pub const SNAPSHOT_THRESHOLD: u64 = 10;

/// Rebuild an aggregate: restore the latest snapshot if one exists, then
/// replay events past it.
pub fn load<A: Aggregate>(log: &dyn EventLog, entity_id: &str) -> Result<A, EventLogError> {
    let mut aggregate = A::default();
    let mut version = 0;

    if let Some(snapshot) = log.read_snapshot(entity_id)? {
        aggregate = serde_json::from_value(snapshot.state)?;
        version = snapshot.version;
        aggregate.set_version(version);
    }

    let events = match log.read(entity_id, version) {
        Ok(events) => events,
        // A snapshot with no tail is a complete load
        Err(EventLogError::NotFound(_)) if version > 0 => Vec::new(),
        Err(e) => return Err(e),
    };
    for stored in events {
        let event: A::Event = serde_json::from_value(stored.payload)?;
        aggregate.apply(&event);
        aggregate.set_version(stored.version);
    }

    Ok(aggregate)
}

/// Persist freshly produced events: envelope them after the aggregate's
/// current version, append with optimistic concurrency, fold them into the
/// aggregate, publish, and snapshot long streams.
///
/// Publication failures are logged and swallowed; the log append is the
/// source of truth.
pub fn persist<A: Aggregate>(
    log: &dyn EventLog,
    bus: &dyn EventBus,
    aggregate: &mut A,
    events: Vec<A::Event>,
) -> Result<(), EventLogError> {
    if events.is_empty() {
        return Ok(());
    }

    let entity_id = if aggregate.version() == 0 {
        // Creation event carries the identity; fold a copy to learn it
        let mut probe = A::default();
        probe.apply(&events[0]);
        probe.entity_id()
    } else {
        aggregate.entity_id()
    };

    let base = aggregate.version();
    let mut stored = Vec::with_capacity(events.len());
    for (offset, event) in events.iter().enumerate() {
        stored.push(StoredEvent {
            entity_id: entity_id.clone(),
            entity_kind: A::KIND.to_string(),
            event_type: event.event_type().to_string(),
            version: base + 1 + offset as u64,
            recorded_at: Utc::now(),
            payload: serde_json::to_value(event)?,
        });
    }

    log.append(&entity_id, base, stored.clone())?;
    aggregate.apply_all(&events);

    for event in &stored {
        if let Err(e) = bus.publish(event) {
            tracing::warn!(
                entity_id = %event.entity_id,
                event_type = %event.event_type,
                error = %e,
                "event publication failed"
            );
        }
    }

    if aggregate.version() > SNAPSHOT_THRESHOLD {
        log.write_snapshot(Snapshot {
            entity_id,
            entity_kind: A::KIND.to_string(),
            version: aggregate.version(),
            taken_at: Utc::now(),
            state: serde_json::to_value(&*aggregate)?,
        })?;
    }

    Ok(())
}

/// Convenience handle bundling a log and bus.
#[derive(Clone)]
pub struct Repository {
    pub log: Arc<dyn EventLog>,
    pub bus: Arc<dyn EventBus>,
}

impl Repository {
    pub fn new(log: Arc<dyn EventLog>, bus: Arc<dyn EventBus>) -> Self {
        Self { log, bus }
    }

    pub fn load<A: Aggregate>(&self, entity_id: &str) -> Result<A, EventLogError> {
        load(self.log.as_ref(), entity_id)
    }

    pub fn persist<A: Aggregate>(
        &self,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), EventLogError> {
        persist(self.log.as_ref(), self.bus.as_ref(), aggregate, events)
    }
}
