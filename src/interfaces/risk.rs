// ============================================================================
// Risk Interface
// Pre-trade assessment of proposed match results
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::match_result::MatchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

/// Outcome of assessing one proposed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    pub fn clear() -> Self {
        Self {
            level: RiskLevel::Low,
            reasons: Vec::new(),
        }
    }
}

/// Pre-trade risk checks. Only `Extreme` blocks execution; lower levels are
/// recorded and passed through.
pub trait RiskEngine: Send + Sync {
    fn assess(&self, result: &MatchResult) -> RiskAssessment;
}

/// Accepts everything. The default when no risk policy is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpRiskEngine;

impl RiskEngine for NoOpRiskEngine {
    fn assess(&self, _result: &MatchResult) -> RiskAssessment {
        RiskAssessment::clear()
    }
}

/// Flags trades by notional size against fixed thresholds.
#[derive(Debug, Clone)]
pub struct NotionalLimitRiskEngine {
    /// Notional at or above this is High.
    pub high_watermark: Decimal,
    /// Notional at or above this is Extreme and blocked.
    pub extreme_watermark: Decimal,
}

impl RiskEngine for NotionalLimitRiskEngine {
    fn assess(&self, result: &MatchResult) -> RiskAssessment {
        if result.total_amount >= self.extreme_watermark {
            RiskAssessment {
                level: RiskLevel::Extreme,
                reasons: vec![format!(
                    "notional {} at or above extreme watermark {}",
                    result.total_amount, self.extreme_watermark
                )],
            }
        } else if result.total_amount >= self.high_watermark {
            RiskAssessment {
                level: RiskLevel::High,
                reasons: vec![format!(
                    "notional {} at or above high watermark {}",
                    result.total_amount, self.high_watermark
                )],
            }
        } else {
            RiskAssessment::clear()
        }
    }
}
