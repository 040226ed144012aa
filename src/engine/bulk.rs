// ============================================================================
// Bulk-Segregated Matching
// Block orders match among themselves first, at a discount
// ============================================================================

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::{OrderBook, OrderBookEntry};
use crate::error::MatchError;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};

use super::price_time::walk;

/// Executions of at least the threshold quantity trade 0.5% below the
/// negotiated price.
const BULK_DISCOUNT: Decimal = dec!(0.995);

/// Splits the book at a share threshold: orders at or above it form a block
/// segment matched first, in isolation, with a block discount; everything
/// else then matches normally. Block remainder does not spill into the
/// regular segment.
#[derive(Debug, Clone, Copy)]
pub struct BulkSegregation {
    pub bulk_threshold: u64,
}

impl BulkSegregation {
    pub fn new(bulk_threshold: u64) -> Self {
        Self { bulk_threshold }
    }

    fn split(&self, entries: Vec<OrderBookEntry>) -> (Vec<OrderBookEntry>, Vec<OrderBookEntry>) {
        entries
            .into_iter()
            .partition(|e| e.remaining >= self.bulk_threshold)
    }
}

impl MatchingStrategy for BulkSegregation {
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if book.is_empty() {
            return Ok(Vec::new());
        }
        let policy = MatchingPolicy::BulkSegregated {
            bulk_threshold: self.bulk_threshold,
        };

        let (bulk_sells, regular_sells) = self.split(book.sorted_sells());
        let (bulk_buys, regular_buys) = self.split(book.sorted_buys());

        let mut results = Vec::new();
        for result in walk(bulk_sells, bulk_buys, ctx, policy, None)? {
            // Partial block executions that fall under the threshold keep
            // the undiscounted price
            if result.shares >= self.bulk_threshold {
                let discounted = (result.price * BULK_DISCOUNT).round_dp(4);
                results.push(result.with_price(discounted));
            } else {
                results.push(result);
            }
        }

        results.extend(walk(regular_sells, regular_buys, ctx, policy, None)?);
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "bulk-segregated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_book::Side;
    use crate::engine::price_time::tests::{book, ctx, entry};

    #[test]
    fn test_block_trades_get_discount() {
        let strategy = BulkSegregation::new(1000);
        let book = book(
            vec![
                entry(Side::Sell, "block_seller", 5000, Some(50), 10),
                entry(Side::Sell, "small_seller", 100, Some(49), 10),
            ],
            vec![
                entry(Side::Buy, "block_buyer", 5000, Some(52), 5),
                entry(Side::Buy, "small_buyer", 100, Some(51), 5),
            ],
        );

        let results = strategy.match_book(&book, &ctx()).unwrap();
        assert_eq!(results.len(), 2);

        let block = results.iter().find(|r| r.shares == 5000).unwrap();
        assert_eq!(block.price, (Decimal::from(50) * dec!(0.995)).round_dp(4));
        assert_eq!(block.seller_id, "block_seller");
        assert_eq!(block.buyer_id, "block_buyer");

        let small = results.iter().find(|r| r.shares == 100).unwrap();
        assert_eq!(small.price, Decimal::from(49));
    }

    #[test]
    fn test_segments_do_not_cross() {
        // The block buy has no block sell to meet; it must not take the
        // small sell even though prices cross
        let strategy = BulkSegregation::new(1000);
        let book = book(
            vec![entry(Side::Sell, "small_seller", 100, Some(50), 10)],
            vec![entry(Side::Buy, "block_buyer", 5000, Some(52), 5)],
        );

        let results = strategy.match_book(&book, &ctx()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_sub_threshold_execution_keeps_full_price() {
        // Block sell meets a block buy, but the smaller leg leaves an
        // execution below the threshold
        let strategy = BulkSegregation::new(1000);
        let book = book(
            vec![entry(Side::Sell, "s1", 1200, Some(50), 10)],
            vec![
                entry(Side::Buy, "b1", 1000, Some(52), 5),
                entry(Side::Buy, "b2", 1000, Some(51), 3),
            ],
        );

        let results = strategy.match_book(&book, &ctx()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].shares, 1000);
        assert_eq!(results[0].price, (Decimal::from(50) * dec!(0.995)).round_dp(4));
        // The 200-share tail trades undiscounted
        assert_eq!(results[1].shares, 200);
        assert_eq!(results[1].price, Decimal::from(50));
    }

    #[test]
    fn test_policy_carries_threshold() {
        let strategy = BulkSegregation::new(500);
        let book = book(
            vec![entry(Side::Sell, "s1", 600, Some(50), 10)],
            vec![entry(Side::Buy, "b1", 600, Some(52), 5)],
        );

        let results = strategy.match_book(&book, &ctx()).unwrap();
        assert_eq!(
            results[0].policy,
            MatchingPolicy::BulkSegregated { bulk_threshold: 500 }
        );
    }
}
