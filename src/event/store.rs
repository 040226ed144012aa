// ============================================================================
// Event Log
// Append-only per-entity event streams with optimistic concurrency
// ============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::EventLogError;
use crate::event::{Snapshot, StoredEvent};

/// Append-only log of per-entity event streams plus a snapshot side table.
///
/// Appends are all-or-nothing and guarded by the expected stream version:
/// a writer that raced another writer gets `VersionConflict` and must
/// re-read before retrying.
pub trait EventLog: Send + Sync {
    /// Append a batch to one entity's stream. `expected_version` is the
    /// version of the last event the writer saw (0 for a new stream); the
    /// batch itself must be numbered consecutively from there.
    fn append(
        &self,
        entity_id: &str,
        expected_version: u64,
        events: Vec<StoredEvent>,
    ) -> Result<(), EventLogError>;

    /// Events for one entity with version strictly greater than
    /// `after_version`, in version order.
    fn read(&self, entity_id: &str, after_version: u64) -> Result<Vec<StoredEvent>, EventLogError>;

    fn read_snapshot(&self, entity_id: &str) -> Result<Option<Snapshot>, EventLogError>;

    fn write_snapshot(&self, snapshot: Snapshot) -> Result<(), EventLogError>;
}

/// Process-local event log. The production deployment would back this with a
/// database table; streams and conflict semantics are identical.
#[derive(Default)]
pub struct InMemoryEventLog {
    streams: RwLock<HashMap<String, Vec<StoredEvent>>>,
    snapshots: RwLock<HashMap<String, Snapshot>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across all streams.
    pub fn event_count(&self) -> usize {
        self.streams.read().values().map(Vec::len).sum()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        entity_id: &str,
        expected_version: u64,
        events: Vec<StoredEvent>,
    ) -> Result<(), EventLogError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut streams = self.streams.write();
        let stream = streams.entry(entity_id.to_string()).or_default();

        let current = stream.last().map(|e| e.version).unwrap_or(0);
        if current != expected_version {
            return Err(EventLogError::VersionConflict {
                entity_id: entity_id.to_string(),
                expected: expected_version,
                found: current,
            });
        }

        for (offset, event) in events.iter().enumerate() {
            let required = expected_version + 1 + offset as u64;
            if event.version != required {
                return Err(EventLogError::Storage(format!(
                    "non-consecutive version {} in batch for {} (wanted {})",
                    event.version, entity_id, required
                )));
            }
        }

        stream.extend(events);
        Ok(())
    }

    fn read(&self, entity_id: &str, after_version: u64) -> Result<Vec<StoredEvent>, EventLogError> {
        let streams = self.streams.read();
        let stream = streams
            .get(entity_id)
            .ok_or_else(|| EventLogError::NotFound(entity_id.to_string()))?;
        Ok(stream
            .iter()
            .filter(|e| e.version > after_version)
            .cloned()
            .collect())
    }

    fn read_snapshot(&self, entity_id: &str) -> Result<Option<Snapshot>, EventLogError> {
        Ok(self.snapshots.read().get(entity_id).cloned())
    }

    fn write_snapshot(&self, snapshot: Snapshot) -> Result<(), EventLogError> {
        self.snapshots
            .write()
            .insert(snapshot.entity_id.clone(), snapshot);
        Ok(())
    }
}
