// ============================================================================
// Error Taxonomy
// Typed errors for commands, matching, event persistence and orchestration
// ============================================================================

use rust_decimal::Decimal;
use thiserror::Error;

/// Business-rule violations raised by aggregate commands.
///
/// A command that returns one of these has not generated any events and has
/// left the aggregate untouched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input to a command (non-positive quantity/price, missing field,
    /// past-dated settlement). Always recoverable locally.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A transition was attempted from a state that does not allow it.
    #[error("cannot {action} while {state}")]
    StateGuard { state: String, action: &'static str },

    /// A settlement action was attempted by someone who is neither the buyer
    /// nor the seller of the trade.
    #[error("user {0} is not a party to this trade")]
    NotAParty(String),
}

impl DomainError {
    pub fn guard(state: impl std::fmt::Debug, action: &'static str) -> Self {
        DomainError::StateGuard {
            state: format!("{:?}", state),
            action,
        }
    }
}

/// Failures of a matching pass. Matching never partially commits: on error,
/// zero match results are produced.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// Uniform price auction could not find a crossing price.
    #[error("no clearing price: best bid {best_bid} is below best ask {best_ask}")]
    NoClearingPrice {
        best_bid: Decimal,
        best_ask: Decimal,
    },

    /// Not enough liquidity on one or both sides to run the algorithm.
    #[error("insufficient orders: {0}")]
    InsufficientOrders(&'static str),

    /// The market data provider could not supply a required figure.
    #[error("market data unavailable: {0}")]
    MarketData(String),
}

/// Errors from the event log collaborator.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// Optimistic concurrency conflict: the stream advanced since the command
    /// was evaluated. Retryable after a fresh read.
    #[error("version conflict on {entity_id}: expected {expected}, found {found}")]
    VersionConflict {
        entity_id: String,
        expected: u64,
        found: u64,
    },

    #[error("entity {0} not found")]
    NotFound(String),

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Errors from event bus publication. Publication is fire-and-forget with
/// respect to persistence, so these are logged and never propagated past the
/// repository layer.
#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Union error for the execution service surface.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    EventLog(#[from] EventLogError),
}

impl ServiceError {
    /// Whether the caller should re-read and retry the command.
    ///
    /// Only optimistic concurrency conflicts are retryable; validation and
    /// state-guard failures will fail the same way on every retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::EventLog(EventLogError::VersionConflict { .. })
        )
    }
}
