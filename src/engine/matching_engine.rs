// ============================================================================
// Matching Engine
// Assembles the book, fixes the context, dispatches to a strategy
// ============================================================================

use std::sync::Arc;

use chrono::Utc;

use crate::domain::config::{MatchingConfig, MatchingPolicy};
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::OrderBook;
use crate::error::MatchError;
use crate::interfaces::market_data::MarketDataProvider;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};
use crate::interfaces::order_book_source::OrderBookSource;

use super::factory::create_strategy;

/// Stateless orchestrator for one venue: reads current aggregates, builds a
/// fresh book and context per pass, and runs the selected strategy. Holding
/// no book state of its own keeps passes deterministic and restart-safe.
pub struct MatchingEngine {
    source: Arc<dyn OrderBookSource>,
    market_data: Arc<dyn MarketDataProvider>,
    config: MatchingConfig,
}

impl MatchingEngine {
    pub fn new(
        source: Arc<dyn OrderBookSource>,
        market_data: Arc<dyn MarketDataProvider>,
        config: MatchingConfig,
    ) -> Self {
        Self {
            source,
            market_data,
            config,
        }
    }

    /// Current book for a security.
    pub fn order_book(&self, security_id: &str) -> OrderBook {
        OrderBook::assemble(
            security_id,
            &self.source.active_listings(security_id),
            &self.source.active_bids(security_id),
            Utc::now(),
        )
    }

    /// Run one matching pass. Pure with respect to aggregates: results are
    /// proposals that the execution layer turns into trades.
    pub fn match_security(
        &self,
        security_id: &str,
        policy: MatchingPolicy,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let book = self.order_book(security_id);
        let ctx = MatchContext::new(
            self.market_data.reference_price(security_id),
            Utc::now(),
            self.config.settlement_days,
        );

        let strategy = create_strategy(policy);
        let results = strategy.match_book(&book, &ctx)?;
        tracing::debug!(
            security_id,
            strategy = strategy.name(),
            sells = book.sells.len(),
            buys = book.buys.len(),
            matches = results.len(),
            "matching pass complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::replay;
    use crate::domain::bid::{Bid, BidKind, PlaceBid};
    use crate::domain::listing::{Listing, ListingKind, OpenListing};
    use crate::interfaces::market_data::StaticMarketData;
    use crate::interfaces::order_book_source::InMemoryOrderBookSource;
    use rust_decimal::Decimal;

    fn engine_with(
        listings: Vec<Listing>,
        bids: Vec<Bid>,
        reference: Option<i64>,
    ) -> MatchingEngine {
        let source = InMemoryOrderBookSource::new();
        for l in listings {
            source.upsert_listing(l);
        }
        for b in bids {
            source.upsert_bid(b);
        }
        let market_data = StaticMarketData::new();
        if let Some(p) = reference {
            market_data.set_price("ACME", Decimal::from(p));
        }
        MatchingEngine::new(
            Arc::new(source),
            Arc::new(market_data),
            MatchingConfig::default(),
        )
    }

    fn listing(price: i64, shares: u64) -> Listing {
        replay(&[Listing::open(OpenListing {
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
        .unwrap()])
    }

    fn bid(price: i64, shares: u64) -> Bid {
        replay(&[Bid::place(PlaceBid {
            listing_id: None,
            security_id: "ACME".to_string(),
            bidder_id: "buyer1".to_string(),
            shares,
            price: Some(Decimal::from(price)),
            stop_price: None,
            kind: BidKind::Limit,
            accredited: true,
            expires_at: None,
        })
        .unwrap()])
    }

    #[test]
    fn test_end_to_end_pass() {
        let engine = engine_with(vec![listing(50, 100)], vec![bid(52, 60)], Some(50));

        let results = engine
            .match_security("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].shares, 60);
        assert_eq!(results[0].price, Decimal::from(50));
        assert_eq!(results[0].security_id, "ACME");
    }

    #[test]
    fn test_empty_security_matches_nothing() {
        let engine = engine_with(vec![], vec![], Some(50));
        let results = engine
            .match_security("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_settlement_date_follows_config() {
        let engine = engine_with(vec![listing(50, 100)], vec![bid(52, 100)], Some(50));
        let before = Utc::now();

        let results = engine
            .match_security("ACME", MatchingPolicy::PriceTime)
            .unwrap();
        let expected_min = before + chrono::Duration::days(3);
        assert!(results[0].settlement_date >= expected_min);
    }
}
