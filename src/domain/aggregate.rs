// ============================================================================
// Event-Sourced Aggregate Discipline
// State is the fold of an ordered event list over an empty initial state
// ============================================================================

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A domain event belonging to one aggregate's closed event set.
///
/// The type tag is used for event bus routing and for the stored envelope;
/// the payload itself is serialized with serde.
pub trait DomainEvent {
    fn event_type(&self) -> &'static str;
}

/// An event-sourced aggregate.
///
/// Aggregates never mutate state directly: commands take `&self`, validate
/// against current state and return the events they would produce; `apply`
/// is the only place fields change, and it is total and infallible. Current
/// state is therefore always reconstructible by replaying the event history
/// from version 0.
pub trait Aggregate: Default + Serialize + DeserializeOwned {
    type Event: DomainEvent + Clone + Serialize + DeserializeOwned;

    /// Entity type tag used to key event streams and snapshots.
    const KIND: &'static str;

    /// Opaque identity of this aggregate instance.
    fn entity_id(&self) -> String;

    /// Version of the last applied event; 0 for a fresh aggregate.
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    /// Fold one event into state. Must not fail; validation belongs to
    /// commands.
    fn apply(&mut self, event: &Self::Event);

    /// Apply a batch of freshly produced events, advancing the version once
    /// per event.
    fn apply_all(&mut self, events: &[Self::Event]) {
        for event in events {
            self.apply(event);
            self.set_version(self.version() + 1);
        }
    }
}

/// Rebuild an aggregate from its full event history.
pub fn replay<A: Aggregate>(events: &[A::Event]) -> A {
    let mut aggregate = A::default();
    aggregate.apply_all(events);
    aggregate
}
