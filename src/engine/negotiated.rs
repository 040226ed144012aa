// ============================================================================
// Negotiated Matching
// Bilateral pricing against a reference, for thinly traded securities
// ============================================================================

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::{OrderBook, OrderBookEntry};
use crate::error::MatchError;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};

/// Priced orders further than this from the reference are out of band.
const BAND: Decimal = dec!(0.10);
/// Market sells are valued slightly below reference, market buys slightly
/// above, so each side concedes a little to trade.
const MARKET_SELL_FACTOR: Decimal = dec!(0.98);
const MARKET_BUY_FACTOR: Decimal = dec!(1.02);
/// Final price nudge toward whichever side has waited longer.
const AGE_NUDGE: Decimal = dec!(0.001);

/// Pairwise negotiation: every sell is tried against every buy, a candidate
/// price is derived from both sides' effective prices, and the pair executes
/// only if both sides' limits accept it.
///
/// The candidate price is the quantity-weighted average of the two effective
/// prices, nudged 0.1% toward the older order. When both sides carry a
/// price, either side sitting more than 10% from the reference blocks the
/// pair; a market order negotiates with any counterparty.
#[derive(Debug, Default, Clone, Copy)]
pub struct NegotiatedMatching;

impl NegotiatedMatching {
    fn in_band(entry: &OrderBookEntry, reference: Decimal) -> bool {
        match entry.limit_price {
            None => true,
            Some(p) => {
                let deviation = if p > reference {
                    p - reference
                } else {
                    reference - p
                };
                deviation <= reference * BAND
            }
        }
    }

    fn negotiate_price(
        sell: &OrderBookEntry,
        buy: &OrderBookEntry,
        reference: Decimal,
    ) -> Decimal {
        let eff_sell = sell
            .limit_price
            .unwrap_or(reference * MARKET_SELL_FACTOR);
        let eff_buy = buy.limit_price.unwrap_or(reference * MARKET_BUY_FACTOR);

        let sell_qty = Decimal::from(sell.remaining);
        let buy_qty = Decimal::from(buy.remaining);
        let weighted = (eff_sell * sell_qty + eff_buy * buy_qty) / (sell_qty + buy_qty);

        // The side that has waited longer gets the price shaded its way
        if sell.submitted_at < buy.submitted_at {
            weighted * (Decimal::ONE + AGE_NUDGE)
        } else if buy.submitted_at < sell.submitted_at {
            weighted * (Decimal::ONE - AGE_NUDGE)
        } else {
            weighted
        }
    }

    fn both_accept(sell: &OrderBookEntry, buy: &OrderBookEntry, price: Decimal) -> bool {
        let seller_ok = sell.limit_price.map_or(true, |ask| price >= ask);
        let buyer_ok = buy.limit_price.map_or(true, |bid| price <= bid);
        seller_ok && buyer_ok
    }
}

impl MatchingStrategy for NegotiatedMatching {
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if book.is_empty() {
            return Ok(Vec::new());
        }
        let reference = ctx.reference()?;
        let settlement_date = ctx.settlement_date();

        let mut sells = book.sorted_sells();
        let mut buys = book.sorted_buys();

        let mut results = Vec::new();
        for sell in sells.iter_mut() {
            for buy in buys.iter_mut() {
                if sell.remaining == 0 {
                    break;
                }
                if buy.remaining == 0 {
                    continue;
                }
                if sell.accredited && !buy.accredited {
                    continue;
                }
                // The band only constrains priced-against-priced pairs
                if sell.limit_price.is_some()
                    && buy.limit_price.is_some()
                    && (!Self::in_band(sell, reference) || !Self::in_band(buy, reference))
                {
                    continue;
                }
                if buy.all_or_none && sell.remaining < buy.remaining {
                    continue;
                }

                let price = Self::negotiate_price(sell, buy, reference);
                if !Self::both_accept(sell, buy, price) {
                    continue;
                }

                let shares = sell.remaining.min(buy.remaining);
                results.push(MatchResult::from_pair(
                    sell,
                    buy,
                    shares,
                    price.round_dp(4),
                    settlement_date,
                    MatchingPolicy::Negotiated,
                ));
                sell.remaining -= shares;
                buy.remaining -= shares;
            }
        }
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "negotiated"
    }
}
