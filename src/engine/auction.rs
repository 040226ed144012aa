// ============================================================================
// Uniform Price Auction
// One clearing price for the whole cross, with FIFO or pro-rata allocation
// ============================================================================

use rust_decimal::Decimal;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::domain::order_book::{OrderBook, OrderBookEntry};
use crate::error::MatchError;
use crate::interfaces::matching_strategy::{MatchContext, MatchingStrategy};

use super::price_time::walk;

/// How shares are split on the excess side of the cross.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationMode {
    /// Priority walk: earlier (better priced, older) orders fill first.
    Walk,
    /// Every order on the excess side gets a floor-proportional share of the
    /// tradeable quantity; the scarce side fills in priority order.
    ProRata,
}

/// Periodic auction that clears the whole cross at one price, the midpoint
/// of best bid and best ask. Orders whose limit is not satisfied at the
/// clearing price sit out.
///
/// With `ProRata` allocation, floor division intentionally under-allocates:
/// fractional remainders stay unmatched rather than being redistributed, so
/// small orders can receive zero.
#[derive(Debug, Clone, Copy)]
pub struct UniformPriceAuction {
    pub allocation: AllocationMode,
}

impl UniformPriceAuction {
    pub fn new(allocation: AllocationMode) -> Self {
        Self { allocation }
    }

    fn policy(&self) -> MatchingPolicy {
        match self.allocation {
            AllocationMode::Walk => MatchingPolicy::UniformAuction,
            AllocationMode::ProRata => MatchingPolicy::ProRataAuction,
        }
    }

    /// Midpoint clearing price. Requires at least one priced order per side
    /// and a crossed book.
    fn clearing_price(&self, book: &OrderBook) -> Result<Decimal, MatchError> {
        let best_ask = book
            .best_ask()
            .ok_or(MatchError::InsufficientOrders("no priced sell orders"))?;
        let best_bid = book
            .best_bid()
            .ok_or(MatchError::InsufficientOrders("no priced buy orders"))?;
        if best_bid < best_ask {
            return Err(MatchError::NoClearingPrice { best_bid, best_ask });
        }
        Ok((best_bid + best_ask) / Decimal::TWO)
    }

    /// Orders willing to trade at the clearing price. Unpriced orders always
    /// participate.
    fn eligible(
        &self,
        book: &OrderBook,
        clearing: Decimal,
    ) -> (Vec<OrderBookEntry>, Vec<OrderBookEntry>) {
        let sells: Vec<_> = book
            .sorted_sells()
            .into_iter()
            .filter(|e| e.limit_price.map_or(true, |ask| ask <= clearing))
            .collect();
        let buys: Vec<_> = book
            .sorted_buys()
            .into_iter()
            .filter(|e| e.limit_price.map_or(true, |bid| bid >= clearing))
            .collect();
        (sells, buys)
    }

    fn allocate_pro_rata(
        &self,
        sells: Vec<OrderBookEntry>,
        buys: Vec<OrderBookEntry>,
        clearing: Decimal,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        let supply: u64 = sells.iter().map(|e| e.remaining).sum();
        let demand: u64 = buys.iter().map(|e| e.remaining).sum();
        let tradeable = supply.min(demand);
        if tradeable == 0 {
            return Ok(Vec::new());
        }

        // Floor-scale the excess side down to the tradeable quantity; the
        // scarce side keeps its full size. All-or-none entries cannot take a
        // reduced allocation, so they drop out instead of shrinking.
        let scale = |entries: Vec<OrderBookEntry>, total: u64| -> Vec<OrderBookEntry> {
            if total <= tradeable {
                return entries;
            }
            entries
                .into_iter()
                .filter_map(|mut e| {
                    let scaled =
                        ((e.remaining as u128 * tradeable as u128) / total as u128) as u64;
                    if e.all_or_none && scaled < e.remaining {
                        return None;
                    }
                    e.remaining = scaled;
                    (e.remaining > 0).then_some(e)
                })
                .collect()
        };

        let sells = scale(sells, supply);
        let buys = scale(buys, demand);

        // Pair the allocations with the priority walk so a buy skipped for
        // one sell (accreditation) keeps its allocation for later sells.
        walk(sells, buys, ctx, self.policy(), Some(clearing))
    }
}

impl MatchingStrategy for UniformPriceAuction {
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError> {
        if book.is_empty() {
            return Ok(Vec::new());
        }
        let clearing = self.clearing_price(book)?;
        let (sells, buys) = self.eligible(book, clearing);

        match self.allocation {
            AllocationMode::Walk => walk(sells, buys, ctx, self.policy(), Some(clearing)),
            AllocationMode::ProRata => self.allocate_pro_rata(sells, buys, clearing, ctx),
        }
    }

    fn name(&self) -> &'static str {
        match self.allocation {
            AllocationMode::Walk => "uniform-auction",
            AllocationMode::ProRata => "pro-rata-auction",
        }
    }
}
