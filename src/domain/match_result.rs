// ============================================================================
// Match Result
// Output of one matched seller/buyer pairing, input to trade creation
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::bid::BidId;
use crate::domain::config::MatchingPolicy;
use crate::domain::listing::ListingId;
use crate::domain::order_book::OrderBookEntry;
use crate::domain::trade::TradeId;

/// One proposed execution produced by a matching pass.
///
/// A result is a plan, not a commitment: trades are only opened from results
/// that survive risk filtering and aggregate-level validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub trade_id: TradeId,
    pub listing_id: ListingId,
    /// `None` when the buy side did not originate from a bid aggregate.
    pub bid_id: Option<BidId>,
    pub buyer_id: String,
    pub seller_id: String,
    pub security_id: String,
    pub shares: u64,
    pub price: Decimal,
    pub total_amount: Decimal,
    pub settlement_date: DateTime<Utc>,
    /// Algorithm that produced this result, kept for provenance.
    pub policy: MatchingPolicy,
}

impl MatchResult {
    /// Build a result for a seller/buyer entry pair at an agreed price.
    pub fn from_pair(
        sell: &OrderBookEntry,
        buy: &OrderBookEntry,
        shares: u64,
        price: Decimal,
        settlement_date: DateTime<Utc>,
        policy: MatchingPolicy,
    ) -> Self {
        Self {
            trade_id: TradeId::new(),
            listing_id: ListingId::from_uuid(sell.order_id),
            bid_id: Some(BidId::from_uuid(buy.order_id)),
            buyer_id: buy.user_id.clone(),
            seller_id: sell.user_id.clone(),
            security_id: sell.security_id.clone(),
            shares,
            price,
            total_amount: price * Decimal::from(shares),
            settlement_date,
            policy,
        }
    }

    /// Re-price the result, keeping the notional consistent.
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = price;
        self.total_amount = price * Decimal::from(self.shares);
        self
    }

    pub fn listing_uuid(&self) -> Uuid {
        *self.listing_id.as_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_book::{OrderBookEntry, Side};
    use chrono::Duration;

    fn entry(side: Side, user: &str, remaining: u64, price: Option<Decimal>) -> OrderBookEntry {
        OrderBookEntry {
            security_id: "ACME".to_string(),
            order_id: Uuid::new_v4(),
            user_id: user.to_string(),
            side,
            remaining,
            limit_price: price,
            submitted_at: Utc::now(),
            accredited: true,
            all_or_none: false,
            expires_at: None,
        }
    }

    #[test]
    fn test_from_pair_computes_notional() {
        let sell = entry(Side::Sell, "seller1", 100, Some(Decimal::from(50)));
        let buy = entry(Side::Buy, "buyer1", 60, Some(Decimal::from(52)));
        let settlement = Utc::now() + Duration::days(3);

        let result = MatchResult::from_pair(
            &sell,
            &buy,
            60,
            Decimal::from(50),
            settlement,
            MatchingPolicy::PriceTime,
        );

        assert_eq!(result.shares, 60);
        assert_eq!(result.total_amount, Decimal::from(3000));
        assert_eq!(result.seller_id, "seller1");
        assert_eq!(result.buyer_id, "buyer1");
        assert_eq!(result.policy, MatchingPolicy::PriceTime);
    }

    #[test]
    fn test_with_price_keeps_notional_consistent() {
        let sell = entry(Side::Sell, "s", 10, Some(Decimal::from(40)));
        let buy = entry(Side::Buy, "b", 10, Some(Decimal::from(40)));
        let result = MatchResult::from_pair(
            &sell,
            &buy,
            10,
            Decimal::from(40),
            Utc::now() + Duration::days(3),
            MatchingPolicy::UniformAuction,
        )
        .with_price(Decimal::from(42));

        assert_eq!(result.price, Decimal::from(42));
        assert_eq!(result.total_amount, Decimal::from(420));
    }
}
