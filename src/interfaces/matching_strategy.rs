// ============================================================================
// Matching Strategy Interface
// Pluggable algorithms over an assembled order book
// ============================================================================

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::match_result::MatchResult;
use crate::domain::order_book::OrderBook;
use crate::error::MatchError;

/// Ambient inputs to a matching pass, fixed for its duration so every
/// strategy sees one consistent reference price and clock.
#[derive(Debug, Clone)]
pub struct MatchContext {
    /// Reference price for the security, when the market data provider has
    /// one. Strategies that price off a reference fail without it.
    pub reference_price: Option<Decimal>,
    pub now: DateTime<Utc>,
    pub settlement_days: i64,
}

impl MatchContext {
    pub fn new(reference_price: Option<Decimal>, now: DateTime<Utc>, settlement_days: i64) -> Self {
        Self {
            reference_price,
            now,
            settlement_days,
        }
    }

    /// The reference price, or a match error when it is required but absent.
    pub fn reference(&self) -> Result<Decimal, MatchError> {
        self.reference_price
            .ok_or_else(|| MatchError::MarketData("no reference price for security".to_string()))
    }

    pub fn settlement_date(&self) -> DateTime<Utc> {
        self.now + Duration::days(self.settlement_days)
    }
}

/// A matching algorithm. Implementations are pure over their inputs: the same
/// book and context always produce the same results, and no state is carried
/// between passes.
pub trait MatchingStrategy: Send + Sync {
    /// Run one pass over the book. On error, no results are produced.
    fn match_book(
        &self,
        book: &OrderBook,
        ctx: &MatchContext,
    ) -> Result<Vec<MatchResult>, MatchError>;

    /// Strategy name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_required() {
        let ctx = MatchContext::new(None, Utc::now(), 3);
        assert!(matches!(ctx.reference(), Err(MatchError::MarketData(_))));

        let ctx = MatchContext::new(Some(Decimal::from(100)), Utc::now(), 3);
        assert_eq!(ctx.reference().unwrap(), Decimal::from(100));
    }

    #[test]
    fn test_settlement_date_offset() {
        let now = Utc::now();
        let ctx = MatchContext::new(None, now, 3);
        assert_eq!(ctx.settlement_date(), now + Duration::days(3));
    }
}
