// ============================================================================
// Price-Time Priority Matching
// Continuous double auction: best price first, oldest first within a price
// ============================================================================

use rust_decimal::Decimal;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::{can_match, OrderBook, OrderBookEntry};
use crate::error::MatchError;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};

/// Two-cursor walk over pre-sorted sides.
///
/// For each sell, buys are tried in priority order; a pairing executes
/// min(remaining) shares and whichever side drains advances its cursor.
/// Incompatible buys are skipped for this sell but stay available for later
/// sells. An all-or-none buy pairs only with a sell whose remaining covers
/// its full quantity. When `uniform_price` is set every execution prices there;
/// otherwise the sell's limit wins, then the buy's limit, then the
/// reference price.
///
/// Example walk (sells left, buys right, quantities in parentheses):
///
///   S1 @50 (100)   B1 @52 (60)    -> 60 @ 50, B1 drained
///   S1 @50 (40)    B2 @50 (40)    -> 40 @ 50, both drained
///   S2 @53 (80)    B3 @51 (90)    -> no cross, buys exhausted
///
pub(crate) fn walk(
    mut sells: Vec<OrderBookEntry>,
    mut buys: Vec<OrderBookEntry>,
    ctx: &MatchContext,
    policy: MatchingPolicy,
    uniform_price: Option<Decimal>,
) -> Result<Vec<MatchResult>, MatchError> {
    let mut results = Vec::new();
    let settlement_date = ctx.settlement_date();

    let mut s = 0;
    while s < sells.len() {
        if sells[s].remaining == 0 {
            s += 1;
            continue;
        }

        let mut b = 0;
        while b < buys.len() && sells[s].remaining > 0 {
            if buys[b].remaining == 0 || !can_match(&sells[s], &buys[b]) {
                b += 1;
                continue;
            }
            // All-or-none buys only pair with a sell that covers them whole
            if buys[b].all_or_none && sells[s].remaining < buys[b].remaining {
                b += 1;
                continue;
            }

            let price = match uniform_price {
                Some(p) => p,
                None => match sells[s].limit_price.or(buys[b].limit_price) {
                    Some(p) => p,
                    // Market sell against market buy needs a reference
                    None => ctx.reference()?,
                },
            };

            let shares = sells[s].remaining.min(buys[b].remaining);
            results.push(MatchResult::from_pair(
                &sells[s],
                &buys[b],
                shares,
                price,
                settlement_date,
                policy,
            ));
            sells[s].remaining -= shares;
            buys[b].remaining -= shares;

            if buys[b].remaining == 0 {
                b += 1;
            }
        }

        s += 1;
    }

    Ok(results)
}

/// Default continuous-trading strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriceTimePriority;

impl MatchingStrategy for PriceTimePriority {
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if book.is_empty() {
            return Ok(Vec::new());
        }
        walk(
            book.sorted_sells(),
            book.sorted_buys(),
            ctx,
            MatchingPolicy::PriceTime,
            None,
        )
    }

    fn name(&self) -> &'static str {
        "price-time"
    }
}
