// ============================================================================
// Engine Layer
// Matching strategies and the engines that run them
// ============================================================================

pub mod advanced;
pub mod auction;
pub mod bulk;
pub mod factory;
pub mod matching_engine;
pub mod negotiated;
pub mod price_time;
pub mod time_weighted;

pub use advanced::{MatchOutcome, RejectedMatch, RiskFilteredEngine};
pub use auction::{AllocationMode, UniformPriceAuction};
pub use bulk::BulkSegregation;
pub use factory::create_strategy;
pub use matching_engine::MatchingEngine;
pub use negotiated::NegotiatedMatching;
pub use price_time::PriceTimePriority;
pub use time_weighted::TimeWeightedPriority;
