//! Static dimension scores read from `[scores.<SYMBOL>]` config sections.

use std::collections::HashMap;

use crate::domain::decision::{Dimension, DimensionScore};
use crate::domain::error::StratgateError;
use crate::ports::config_port::ConfigPort;
use crate::ports::scorer_port::DimensionScorer;

pub struct StaticScoreAdapter {
    dimension: Dimension,
    scores: HashMap<String, f64>,
}

impl StaticScoreAdapter {
    pub fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            scores: HashMap::new(),
        }
    }

    /// Read `dimension` for each of `symbols`; symbols without a value are
    /// left out and fail at scoring time.
    pub fn from_config(config: &dyn ConfigPort, dimension: Dimension, symbols: &[String]) -> Self {
        let scores = symbols
            .iter()
            .filter_map(|symbol| {
                let section = format!("scores.{symbol}");
                let raw = config.get_string(&section, dimension.as_str())?;
                raw.trim().parse::<f64>().ok().map(|v| (symbol.to_uppercase(), v))
            })
            .collect();
        Self { dimension, scores }
    }

    pub fn with_score(mut self, symbol: &str, score: f64) -> Self {
        self.scores.insert(symbol.to_uppercase(), score);
        self
    }
}

impl DimensionScorer for StaticScoreAdapter {
    fn dimension(&self) -> Dimension {
        self.dimension
    }

    fn score(&self, symbol: &str) -> Result<DimensionScore, StratgateError> {
        let value = self
            .scores
            .get(&symbol.to_uppercase())
            .copied()
            .ok_or_else(|| StratgateError::ScorerUnavailable {
                dimension: self.dimension.to_string(),
                symbol: symbol.to_string(),
                reason: "no score configured".to_string(),
            })?;
        Ok(DimensionScore::new(self.dimension, value).with_detail("source", "static"))
    }
}
