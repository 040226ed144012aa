// ============================================================================
// Event Layer
// Durable event streams, snapshots, publication and aggregate persistence
// ============================================================================

pub mod bus;
pub mod repository;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A serialized domain event with its stream envelope. Versions within a
/// stream are consecutive starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub entity_id: String,
    pub entity_kind: String,
    pub event_type: String,
    pub version: u64,
    pub recorded_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// A point-in-time serialized aggregate, taken to bound replay cost on long
/// streams. Loading resumes replay from `version + 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub entity_id: String,
    pub entity_kind: String,
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub state: serde_json::Value,
}

pub use bus::{EventBus, InMemoryEventBus, LoggingEventBus, NoOpEventBus};
pub use repository::{load, persist, Repository, SNAPSHOT_THRESHOLD};
pub use store::{EventLog, InMemoryEventLog};
