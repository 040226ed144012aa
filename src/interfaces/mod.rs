// ============================================================================
// Interfaces
// Traits at the seams: strategies, data sources, market data, risk
// ============================================================================

pub mod market_data;
pub mod matching_strategy;
pub mod order_book_source;
pub mod risk;

pub use market_data::{MarketDataProvider, StaticMarketData};
pub use matching_strategy::{MatchContext, MatchingStrategy};
pub use order_book_source::{InMemoryOrderBookSource, OrderBookSource};
pub use risk::{NoOpRiskEngine, NotionalLimitRiskEngine, RiskAssessment, RiskEngine, RiskLevel};
