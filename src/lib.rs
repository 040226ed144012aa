// ============================================================================
// Marketplace Engine Library
// Order matching and trade settlement core for a securities marketplace
// ============================================================================

//! # Marketplace Engine
//!
//! The order-matching and trade-settlement core of a private securities
//! marketplace: sellers open listings, buyers place bids, pluggable matching
//! algorithms pair them, and matched trades are settled through an
//! event-sourced lifecycle.
//!
//! ## Features
//!
//! - **Event-sourced aggregates**: listings, bids and trades are rebuilt by
//!   replaying their event streams, with snapshots bounding replay cost
//! - **Pluggable matching algorithms**: price-time, time-weighted, uniform
//!   price auction (FIFO or pro-rata allocation), negotiated and
//!   bulk-segregated
//! - **Settlement state machine** from match through confirmation, escrow,
//!   payment and share transfer to final settlement
//! - **Pre-trade risk filtering** with rejected matches kept for audit
//!
//! ## Example
//!
//! ```rust
//! use marketplace_engine::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let source = Arc::new(InMemoryOrderBookSource::new());
//! let market_data = Arc::new(StaticMarketData::with_price("ACME", Decimal::from(50)));
//! let source_handle: Arc<dyn OrderBookSource> = source.clone();
//! let engine = MatchingEngine::new(source_handle, market_data, MatchingConfig::default());
//! let service = ExecutionService::new(
//!     Repository::new(Arc::new(InMemoryEventLog::new()), Arc::new(NoOpEventBus)),
//!     RiskFilteredEngine::new(engine, Arc::new(NoOpRiskEngine)),
//!     source,
//! );
//!
//! service.open_listing(OpenListing {
//!     security_id: "ACME".into(),
//!     seller_id: "seller1".into(),
//!     shares: 100,
//!     kind: ListingKind::Fixed,
//!     min_price: None,
//!     reserve_price: None,
//!     current_price: Some(Decimal::from(50)),
//!     restriction: None,
//!     accredited_only: false,
//!     expires_at: None,
//! }).unwrap();
//!
//! service.place_bid(PlaceBid {
//!     listing_id: None,
//!     security_id: "ACME".into(),
//!     bidder_id: "buyer1".into(),
//!     shares: 100,
//!     price: Some(Decimal::from(52)),
//!     stop_price: None,
//!     kind: BidKind::Limit,
//!     accredited: true,
//!     expires_at: None,
//! }).unwrap();
//!
//! let trades = service.run_matching("ACME", MatchingPolicy::PriceTime).unwrap();
//! assert_eq!(trades[0].shares, 100);
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod interfaces;
pub mod service;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        replay, Aggregate, Bid, BidEvent, BidId, BidKind, BidStatus, Listing, ListingEvent,
        ListingId, ListingKind, ListingStatus, MatchResult, MatchingConfig, MatchingPolicy,
        OpenListing, OrderBook, OrderBookEntry, PaymentRecord, PlaceBid, Side, Trade, TradeEvent,
        TradeId, TradeStatus, TransferRecord,
    };
    pub use crate::engine::{
        create_strategy, BulkSegregation, MatchOutcome, MatchingEngine, NegotiatedMatching,
        PriceTimePriority, RiskFilteredEngine, TimeWeightedPriority, UniformPriceAuction,
    };
    pub use crate::error::{DomainError, EventLogError, MatchError, ServiceError};
    pub use crate::event::{
        EventBus, EventLog, InMemoryEventBus, InMemoryEventLog, NoOpEventBus, Repository,
    };
    pub use crate::interfaces::{
        InMemoryOrderBookSource, MarketDataProvider, MatchContext, MatchingStrategy,
        NoOpRiskEngine, OrderBookSource, RiskEngine, RiskLevel, StaticMarketData,
    };
    pub use crate::service::ExecutionService;
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn service_with_reference(reference: Option<i64>) -> ExecutionService {
        let source = Arc::new(InMemoryOrderBookSource::new());
        let market_data = Arc::new(StaticMarketData::new());
        if let Some(p) = reference {
            market_data.set_price("ACME", Decimal::from(p));
        }
        let source_handle: Arc<dyn OrderBookSource> = source.clone();
        let engine = MatchingEngine::new(source_handle, market_data, MatchingConfig::default());
        ExecutionService::new(
            Repository::new(Arc::new(InMemoryEventLog::new()), Arc::new(NoOpEventBus)),
            RiskFilteredEngine::new(engine, Arc::new(NoOpRiskEngine)),
            source,
        )
    }

    fn open_listing(service: &ExecutionService, price: i64, shares: u64) -> Listing {
        service
            .open_listing(OpenListing {
                security_id: "ACME".to_string(),
                seller_id: "seller1".to_string(),
                shares,
                kind: ListingKind::Fixed,
                min_price: None,
                reserve_price: None,
                current_price: Some(Decimal::from(price)),
                restriction: None,
                accredited_only: false,
                expires_at: None,
            })
            .unwrap()
    }

    fn place_limit_bid(
        service: &ExecutionService,
        bidder: &str,
        price: i64,
        shares: u64,
    ) -> Bid {
        service
            .place_bid(PlaceBid {
                listing_id: None,
                security_id: "ACME".to_string(),
                bidder_id: bidder.to_string(),
                shares,
                price: Some(Decimal::from(price)),
                stop_price: None,
                kind: BidKind::Limit,
                accredited: true,
                expires_at: None,
            })
            .unwrap()
    }

    // Listing of 100 @ 50 against a bid of 60 @ 52: partial execution at the
    // sell price, listing stays active with 40 remaining.
    #[test]
    fn test_partial_fill_leaves_listing_active() {
        let service = service_with_reference(Some(50));
        let listing = open_listing(&service, 50, 100);
        place_limit_bid(&service, "buyer1", 52, 60);

        let trades = service
            .run_matching("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].shares, 60);
        assert_eq!(trades[0].price, Decimal::from(50));
        assert_eq!(trades[0].total_amount, Decimal::from(3000));

        let listing = service.listing(&listing.id.to_string()).unwrap();
        assert_eq!(listing.shares_remaining, 40);
        assert_eq!(listing.status, ListingStatus::Active);
    }

    // Bid larger than the listing: the listing drains, the bid keeps the
    // unmatched balance open.
    #[test]
    fn test_oversized_bid_keeps_remainder_open() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 50, 100);
        let bid = place_limit_bid(&service, "buyer1", 52, 150);

        let trades = service
            .run_matching("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].shares, 100);
        assert_eq!(trades[0].price, Decimal::from(50));

        let bid = service.bid(&bid.id.to_string()).unwrap();
        assert_eq!(bid.status, BidStatus::PartiallyFilled);
        assert_eq!(bid.shares_remaining, 50);
        assert_eq!(bid.shares_filled, 100);
    }

    // Draining a listing completes it in the same matching run.
    #[test]
    fn test_full_fill_completes_listing_and_bid() {
        let service = service_with_reference(Some(50));
        let listing = open_listing(&service, 50, 100);
        let bid = place_limit_bid(&service, "buyer1", 50, 100);

        service
            .run_matching("ACME", MatchingPolicy::PriceTime)
            .unwrap();

        let listing = service.listing(&listing.id.to_string()).unwrap();
        assert_eq!(listing.status, ListingStatus::Completed);
        let bid = service.bid(&bid.id.to_string()).unwrap();
        assert_eq!(bid.status, BidStatus::Filled);
    }

    // Uniform auction over several priced orders clears everything tradeable
    // at one midpoint price.
    #[test]
    fn test_uniform_auction_single_clearing_price() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 48, 100);
        open_listing(&service, 49, 50);
        place_limit_bid(&service, "buyer1", 52, 80);
        place_limit_bid(&service, "buyer2", 51, 70);

        let trades = service
            .run_matching("ACME", MatchingPolicy::UniformAuction)
            .unwrap();

        assert!(!trades.is_empty());
        // Clearing price: (52 + 48) / 2
        assert!(trades.iter().all(|t| t.price == Decimal::from(50)));
        let total: u64 = trades.iter().map(|t| t.shares).sum();
        assert_eq!(total, 150);
    }

    // An uncrossed book fails the auction without touching any aggregate.
    #[test]
    fn test_uncrossed_auction_fails_cleanly() {
        let service = service_with_reference(Some(50));
        let listing = open_listing(&service, 55, 100);
        place_limit_bid(&service, "buyer1", 50, 100);

        let err = service
            .run_matching("ACME", MatchingPolicy::UniformAuction)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Match(MatchError::NoClearingPrice { .. })
        ));

        let listing = service.listing(&listing.id.to_string()).unwrap();
        assert_eq!(listing.shares_remaining, 100);
    }

    #[test]
    fn test_negotiated_requires_reference() {
        let service = service_with_reference(None);
        open_listing(&service, 50, 100);
        place_limit_bid(&service, "buyer1", 52, 100);

        let err = service
            .run_matching("ACME", MatchingPolicy::Negotiated)
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Match(MatchError::MarketData(_))
        ));
    }

    #[test]
    fn test_negotiated_executes_within_band() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 49, 100);
        place_limit_bid(&service, "buyer1", 52, 100);

        let trades = service
            .run_matching("ACME", MatchingPolicy::Negotiated)
            .unwrap();
        assert_eq!(trades.len(), 1);
        let price = trades[0].price;
        assert!(price >= Decimal::from(49) && price <= Decimal::from(52));
    }

    // Bulk segregation: the block pair trades at a discount, the odd lot at
    // full price, and the segments never cross.
    #[test]
    fn test_bulk_segregation_end_to_end() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 50, 5000);
        open_listing(&service, 50, 100);
        place_limit_bid(&service, "block_buyer", 52, 5000);
        place_limit_bid(&service, "small_buyer", 52, 100);

        let trades = service
            .run_matching(
                "ACME",
                MatchingPolicy::BulkSegregated {
                    bulk_threshold: 1000,
                },
            )
            .unwrap();

        assert_eq!(trades.len(), 2);
        let block = trades.iter().find(|t| t.shares == 5000).unwrap();
        let small = trades.iter().find(|t| t.shares == 100).unwrap();
        assert!(block.price < Decimal::from(50));
        assert_eq!(small.price, Decimal::from(50));
    }

    // Settlement is idempotent at each step: repeating a confirmation or a
    // payment with the same reference changes nothing.
    #[test]
    fn test_settlement_idempotency() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 50, 100);
        place_limit_bid(&service, "buyer1", 52, 100);
        let trades = service
            .run_matching("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        let trade_id = trades[0].id.to_string();

        service.confirm_trade(&trade_id, "buyer1").unwrap();
        let after_repeat = service.confirm_trade(&trade_id, "buyer1").unwrap();
        assert_eq!(after_repeat.status, TradeStatus::PendingConfirmation);

        service.confirm_trade(&trade_id, "seller1").unwrap();
        service.initiate_settlement(&trade_id, "escrow-1").unwrap();
        let repeat = service.initiate_settlement(&trade_id, "escrow-1").unwrap();
        assert_eq!(repeat.status, TradeStatus::SettlementInitiated);

        let payment = PaymentRecord {
            amount: Decimal::from(5000),
            currency: "USD".to_string(),
            method: "wire".to_string(),
            transaction_ref: "TXN-1".to_string(),
            received_at: Utc::now(),
        };
        service.record_payment(&trade_id, payment.clone()).unwrap();
        let repeat = service.record_payment(&trade_id, payment).unwrap();
        assert_eq!(repeat.status, TradeStatus::PaymentReceived);
    }

    // The trade history is the audit trail: reloading from the stored events
    // reproduces the working state exactly.
    #[test]
    fn test_event_stream_is_complete_audit_trail() {
        let service = service_with_reference(Some(50));
        open_listing(&service, 50, 100);
        place_limit_bid(&service, "buyer1", 52, 100);
        let trades = service
            .run_matching("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        let trade_id = trades[0].id.to_string();

        service.confirm_trade(&trade_id, "buyer1").unwrap();
        let trade = service.confirm_trade(&trade_id, "seller1").unwrap();

        let reloaded = service.trade(&trade_id).unwrap();
        assert_eq!(reloaded.status, trade.status);
        assert_eq!(reloaded.version(), trade.version());
        assert_eq!(reloaded.buyer_confirmed_at, trade.buyer_confirmed_at);
    }
}
