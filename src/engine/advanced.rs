// ============================================================================
// Risk-Filtered Matching
// Wraps the engine with pre-trade risk assessment
// ============================================================================

use std::sync::Arc;

use crate::domain::config::MatchingPolicy;
use crate::domain::match_result::MatchResult;
use crate::error::MatchError;
use crate::interfaces::risk::{RiskAssessment, RiskEngine, RiskLevel};

use super::matching_engine::MatchingEngine;

/// A proposed execution blocked by risk policy, kept for audit.
#[derive(Debug, Clone)]
pub struct RejectedMatch {
    pub result: MatchResult,
    pub assessment: RiskAssessment,
}

/// Outcome of a risk-filtered pass: what may execute and what was blocked.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub accepted: Vec<MatchResult>,
    pub rejected: Vec<RejectedMatch>,
}

/// Matching engine with pre-trade risk checks. Only `Extreme` assessments
/// block a result; lower levels pass through with their assessment logged.
pub struct RiskFilteredEngine {
    engine: MatchingEngine,
    risk: Arc<dyn RiskEngine>,
}

impl RiskFilteredEngine {
    pub fn new(engine: MatchingEngine, risk: Arc<dyn RiskEngine>) -> Self {
        Self { engine, risk }
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn match_security(
        &self,
        security_id: &str,
        policy: MatchingPolicy,
    ) -> Result<MatchOutcome, MatchError> {
        let results = self.engine.match_security(security_id, policy)?;

        let mut outcome = MatchOutcome::default();
        for result in results {
            let assessment = self.risk.assess(&result);
            if assessment.level == RiskLevel::Extreme {
                tracing::warn!(
                    security_id,
                    trade_id = %result.trade_id,
                    shares = result.shares,
                    reasons = ?assessment.reasons,
                    "match blocked by risk policy"
                );
                outcome.rejected.push(RejectedMatch { result, assessment });
            } else {
                outcome.accepted.push(result);
            }
        }
        Ok(outcome)
    }
}
