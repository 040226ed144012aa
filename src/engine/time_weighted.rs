// ============================================================================
// Time-Weighted Priority Matching
// Price-time variant where order age earns up to 2x priority within a level
// ============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::{OrderBook, OrderBookEntry};
use crate::error::MatchError;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};

use super::price_time::walk;

/// Age weight: 1.0 for fresh orders, growing logarithmically with resting
/// hours and capped at 2.0 (reached after ~10 hours).
pub(crate) fn age_weight(submitted_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - submitted_at).num_seconds() as f64 / 3600.0;
    if hours <= 1.0 {
        1.0
    } else {
        (1.0 + hours.log10()).clamp(1.0, 2.0)
    }
}

// Weight as an integer sort key; f64 is not Ord and the precision here is
// far beyond what the weight formula distinguishes.
fn weight_key(entry: &OrderBookEntry, now: DateTime<Utc>) -> i64 {
    (age_weight(entry.submitted_at, now) * 1_000_000.0) as i64
}

// Prices are bucketed to cents so that weight only reorders orders whose
// prices are effectively equal, keeping the comparator transitive.
fn price_bucket(price: Option<Decimal>) -> (u8, Decimal) {
    match price {
        None => (0, Decimal::ZERO),
        Some(p) => (1, p.round_dp(2)),
    }
}

/// Price-time priority with age weighting inside each price level.
///
/// Use case: venues that want to reward liquidity left resting on the book
/// without abandoning price priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeWeightedPriority;

impl TimeWeightedPriority {
    fn sorted_sells(&self, book: &OrderBook, now: DateTime<Utc>) -> Vec<OrderBookEntry> {
        let mut sells = book.sells.clone();
        sells.sort_by(|a, b| {
            price_bucket(a.limit_price)
                .partial_cmp(&price_bucket(b.limit_price))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| weight_key(b, now).cmp(&weight_key(a, now)))
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        });
        sells
    }

    fn sorted_buys(&self, book: &OrderBook, now: DateTime<Utc>) -> Vec<OrderBookEntry> {
        let mut buys = book.buys.clone();
        buys.sort_by(|a, b| {
            let (a_tag, a_price) = price_bucket(a.limit_price);
            let (b_tag, b_price) = price_bucket(b.limit_price);
            (a_tag, -a_price)
                .partial_cmp(&(b_tag, -b_price))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| weight_key(b, now).cmp(&weight_key(a, now)))
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
        });
        buys
    }
}

impl MatchingStrategy for TimeWeightedPriority {
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if book.is_empty() {
            return Ok(Vec::new());
        }
        walk(
            self.sorted_sells(book, ctx.now),
            self.sorted_buys(book, ctx.now),
            ctx,
            MatchingPolicy::TimeWeighted,
            None,
        )
    }

    fn name(&self) -> &'static str {
        "time-weighted"
    }
}
