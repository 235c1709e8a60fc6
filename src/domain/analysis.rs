//! Parallel fan-out over the validator and the other dimension scorers.

use rayon::prelude::*;
use tracing::debug;

use super::decision::{Decision, DecisionConfig, TechnicalScore, synthesize};
use super::error::StratgateError;
use super::pattern::PatternKind;
use super::validator::StrategyValidator;
use super::verdict::ValidationVerdict;
use crate::ports::scorer_port::DimensionScorer;

pub struct Scorers {
    pub fundamental: Box<dyn DimensionScorer>,
    pub sentiment: Box<dyn DimensionScorer>,
    pub management: Box<dyn DimensionScorer>,
}

/// Validate `kind` on every symbol in parallel. Output order follows input.
pub fn validate_many(
    validator: &StrategyValidator,
    symbols: &[String],
    kind: PatternKind,
) -> Vec<ValidationVerdict> {
    symbols
        .par_iter()
        .map(|symbol| validator.validate(symbol, kind))
        .collect()
}

/// Score every dimension for `symbol` concurrently, then decide.
pub fn analyze_symbol(
    symbol: &str,
    kind: PatternKind,
    validator: &StrategyValidator,
    scorers: &Scorers,
    config: &DecisionConfig,
) -> Result<Decision, StratgateError> {
    let (verdict, (fundamental, (sentiment, management))) = rayon::join(
        || validator.validate(symbol, kind),
        || {
            rayon::join(
                || scorers.fundamental.score(symbol),
                || {
                    rayon::join(
                        || scorers.sentiment.score(symbol),
                        || scorers.management.score(symbol),
                    )
                },
            )
        },
    );
    let (fundamental, sentiment, management) = (fundamental?, sentiment?, management?);

    let technical = TechnicalScore::from_verdict(verdict);
    debug!(symbol, technical = technical.score.score, "dimension scores ready");
    Ok(synthesize(
        symbol,
        &fundamental,
        &technical,
        &sentiment,
        &management,
        config,
    ))
}
