// ============================================================================
// Matching Configuration
// Policy selection and engine-wide settings
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Matching Policy
// ============================================================================

/// The matching algorithm to run for a pass.
///
/// The policy is also recorded on every match result and trade as provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchingPolicy {
    /// Continuous double auction with price-time (FIFO) priority.
    /// Use case: default continuous trading.
    PriceTime,

    /// Price-time priority where equal-priced orders are tie-broken by an
    /// age weight instead of raw FIFO, giving older orders up to 2x
    /// effective priority.
    TimeWeighted,

    /// Uniform price auction: one clearing price, matching only among orders
    /// whose limit is satisfied at that price.
    /// Use case: opening/closing crosses, periodic auctions.
    UniformAuction,

    /// Uniform price auction with floor-based pro-rata allocation on the
    /// excess side.
    ProRataAuction,

    /// Bilateral negotiated pricing against a reference price.
    /// Use case: thinly traded securities without a continuous book.
    Negotiated,

    /// Orders at or above the threshold are matched first, in isolation,
    /// with a block discount; remaining orders are matched normally.
    BulkSegregated { bulk_threshold: u64 },
}

impl MatchingPolicy {
    /// Short policy name for logging and provenance display.
    pub fn name(&self) -> &'static str {
        match self {
            MatchingPolicy::PriceTime => "price-time",
            MatchingPolicy::TimeWeighted => "time-weighted",
            MatchingPolicy::UniformAuction => "uniform-auction",
            MatchingPolicy::ProRataAuction => "pro-rata-auction",
            MatchingPolicy::Negotiated => "negotiated",
            MatchingPolicy::BulkSegregated { .. } => "bulk-segregated",
        }
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Engine-wide matching settings.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Days between match and settlement date (T+N).
    pub settlement_days: i64,
}

impl MatchingConfig {
    pub fn new(settlement_days: i64) -> Self {
        Self { settlement_days }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.settlement_days < 0 {
            return Err("settlement days cannot be negative".to_string());
        }
        Ok(())
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        // T+3, the convention for private securities transfers
        Self { settlement_days: 3 }
    }
}
