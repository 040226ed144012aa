// ============================================================================
// Strategy Factory
// Maps a matching policy to its strategy implementation
// ============================================================================

use crate::domain::config::MatchingPolicy;
use crate::interfaces::matching_strategy::MatchingStrategy;

use super::auction::{AllocationMode, UniformPriceAuction};
use super::bulk::BulkSegregation;
use super::negotiated::NegotiatedMatching;
use super::price_time::PriceTimePriority;
use super::time_weighted::TimeWeightedPriority;

/// Build the strategy for a policy. Every policy has an implementation, so
/// this cannot fail.
pub fn create_strategy(policy: MatchingPolicy) -> Box<dyn MatchingStrategy> {
    match policy {
        MatchingPolicy::PriceTime => Box::new(PriceTimePriority),
        MatchingPolicy::TimeWeighted => Box::new(TimeWeightedPriority),
        MatchingPolicy::UniformAuction => {
            Box::new(UniformPriceAuction::new(AllocationMode::Walk))
        }
        MatchingPolicy::ProRataAuction => {
            Box::new(UniformPriceAuction::new(AllocationMode::ProRata))
        }
        MatchingPolicy::Negotiated => Box::new(NegotiatedMatching),
        MatchingPolicy::BulkSegregated { bulk_threshold } => {
            Box::new(BulkSegregation::new(bulk_threshold))
        }
    }
}
