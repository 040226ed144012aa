// ============================================================================
// Service Layer
// Orchestration over the engine and the event-sourced aggregates
// ============================================================================

pub mod execution;

pub use execution::ExecutionService;
