// ============================================================================
// Market Data Interface
// Reference prices for reference-priced matching
// ============================================================================

use std::collections::HashMap;

use parking_lot::RwLock;
use rust_decimal::Decimal;

/// Source of per-security pricing context. Negotiated matching and market
/// orders without a crossing limit price are valued off this.
pub trait MarketDataProvider: Send + Sync {
    /// Current reference price, if the security has one.
    fn reference_price(&self, security_id: &str) -> Option<Decimal>;

    /// Price of the last executed trade, if any.
    fn last_trade_price(&self, security_id: &str) -> Option<Decimal> {
        self.reference_price(security_id)
    }
}

/// Fixed price table, suitable for tests and for venues where reference
/// prices are set administratively.
#[derive(Default)]
pub struct StaticMarketData {
    prices: RwLock<HashMap<String, Decimal>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(security_id: &str, price: Decimal) -> Self {
        let data = Self::default();
        data.set_price(security_id, price);
        data
    }

    pub fn set_price(&self, security_id: &str, price: Decimal) {
        self.prices.write().insert(security_id.to_string(), price);
    }
}

impl MarketDataProvider for StaticMarketData {
    fn reference_price(&self, security_id: &str) -> Option<Decimal> {
        self.prices.read().get(security_id).copied()
    }
}
