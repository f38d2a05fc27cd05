//! Tunable thresholds for transaction-to-invoice matching

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{ResicoError, ResicoResult};
use crate::utils::decimal::decimal;

/// Matching thresholds. Immutable once built; pass it to every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Relative amount difference still scored as an exact match (0.005 = 0.5%)
    pub amount_tolerance: BigDecimal,
    /// Days of date difference still inside the matching window
    pub max_date_diff: i64,
    /// Minimum weighted confidence for a pair to be kept
    pub min_confidence: BigDecimal,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: decimal(5, 3),
            max_date_diff: 7,
            min_confidence: decimal(65, 2),
        }
    }
}

impl MatchingConfig {
    pub fn with_amount_tolerance(mut self, amount_tolerance: BigDecimal) -> Self {
        self.amount_tolerance = amount_tolerance;
        self
    }

    pub fn with_max_date_diff(mut self, max_date_diff: i64) -> Self {
        self.max_date_diff = max_date_diff;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: BigDecimal) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Check that every threshold is inside the range the scorer expects.
    /// Amounts beyond 5% are always rejected, so a wider tolerance is meaningless.
    pub fn validate(&self) -> ResicoResult<()> {
        let zero = BigDecimal::from(0);

        if self.amount_tolerance < zero || self.amount_tolerance > decimal(5, 2) {
            return Err(ResicoError::InvalidConfig(format!(
                "amount_tolerance must be between 0 and 0.05, got {}",
                self.amount_tolerance
            )));
        }

        if self.max_date_diff < 0 {
            return Err(ResicoError::InvalidConfig(format!(
                "max_date_diff cannot be negative, got {}",
                self.max_date_diff
            )));
        }

        if self.min_confidence < zero || self.min_confidence > BigDecimal::from(1) {
            return Err(ResicoError::InvalidConfig(format!(
                "min_confidence must be between 0 and 1, got {}",
                self.min_confidence
            )));
        }

        Ok(())
    }
}
