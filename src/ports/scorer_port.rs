//! Non-technical analysis dimensions.

use crate::domain::decision::{Dimension, DimensionScore};
use crate::domain::error::StratgateError;

pub trait DimensionScorer: Send + Sync {
    fn dimension(&self) -> Dimension;

    /// Failures surface as [`StratgateError::ScorerUnavailable`].
    fn score(&self, symbol: &str) -> Result<DimensionScore, StratgateError>;
}
