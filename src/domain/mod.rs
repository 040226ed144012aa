// ============================================================================
// Domain Layer
// Event-sourced aggregates, the order book, and matching configuration
// ============================================================================

pub mod aggregate;
pub mod bid;
pub mod config;
pub mod listing;
pub mod match_result;
pub mod order_book;
pub mod trade;

pub use aggregate::{replay, Aggregate, DomainEvent};
pub use bid::{Bid, BidEvent, BidFill, BidId, BidKind, BidStatus, PlaceBid};
pub use config::{MatchingConfig, MatchingPolicy};
pub use listing::{
    Listing, ListingEvent, ListingId, ListingKind, ListingStatus, OpenListing, RestrictionKind,
};
pub use match_result::MatchResult;
pub use order_book::{can_match, OrderBook, OrderBookEntry, Side};
pub use trade::{
    PaymentRecord, Trade, TradeEvent, TradeId, TradeParty, TradeStatus, TransferRecord,
};
