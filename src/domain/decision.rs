//! Combining dimension scores into a trade decision.
//!
//! Vetoes run first, in a fixed order, and stop at the first failure. A
//! vetoed symbol is rejected without a composite score. Otherwise the four
//! scores are blended with configurable weights and bucketed into an action.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::verdict::ValidationVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Fundamental,
    Technical,
    Sentiment,
    Management,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Fundamental => "fundamental",
            Dimension::Technical => "technical",
            Dimension::Sentiment => "sentiment",
            Dimension::Management => "management",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 0-100 score plus free-form supporting detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: f64,
    pub detail: BTreeMap<String, String>,
}

impl DimensionScore {
    /// Scores outside 0-100 are clamped.
    pub fn new(dimension: Dimension, score: f64) -> Self {
        DimensionScore {
            dimension,
            score: score.clamp(0.0, 100.0),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.detail.insert(key.into(), value.to_string());
        self
    }
}

/// The technical dimension always carries its validation verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalScore {
    pub score: DimensionScore,
    pub verdict: ValidationVerdict,
}

impl TechnicalScore {
    pub fn new(score: f64, verdict: ValidationVerdict) -> Self {
        TechnicalScore {
            score: DimensionScore::new(Dimension::Technical, score)
                .with_detail("validated", verdict.validated),
            verdict,
        }
    }

    /// Score derived from backtest quality: win rate dominates, profit
    /// factor (capped at 3) and drawdown headroom add up to 20 each.
    /// Unvalidated strategies never score 50 or more.
    pub fn from_verdict(verdict: ValidationVerdict) -> Self {
        let m = &verdict.metrics;
        let raw = if m.closed_trades == 0 {
            0.0
        } else {
            let win = 0.6 * m.win_rate;
            let profit = 20.0 * m.profit_factor.min(3.0) / 3.0;
            let drawdown = 20.0 * (1.0 + m.max_drawdown / 25.0).clamp(0.0, 1.0);
            win + profit + drawdown
        };
        let score = if verdict.validated { raw.max(50.0) } else { raw.min(49.0) };

        let mut technical = TechnicalScore::new(score, verdict);
        technical.score = technical
            .score
            .with_detail("win_rate", format!("{:.1}", technical.verdict.metrics.win_rate))
            .with_detail("profit_factor", format!("{:.2}", technical.verdict.metrics.profit_factor))
            .with_detail("max_drawdown", format!("{:.1}", technical.verdict.metrics.max_drawdown))
            .with_detail("closed_trades", technical.verdict.metrics.closed_trades);
        technical
    }

    pub fn win_rate(&self) -> f64 {
        self.verdict.metrics.win_rate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    StrongBuy,
    Buy,
    Watchlist,
    Reject,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::StrongBuy => "STRONG_BUY",
            Action::Buy => "BUY",
            Action::Watchlist => "WATCHLIST",
            Action::Reject => "REJECT",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Veto {
    WeakFundamentals,
    PoorManagement,
    NotBacktestValidated,
    LowBacktestWinRate,
}

impl Veto {
    pub fn reason(&self) -> &'static str {
        match self {
            Veto::WeakFundamentals => "weak fundamentals",
            Veto::PoorManagement => "poor management quality",
            Veto::NotBacktestValidated => "strategy not backtest-validated",
            Veto::LowBacktestWinRate => "backtest win rate below threshold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VetoCheck {
    pub veto: Veto,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    pub weight_fundamental: f64,
    pub weight_technical: f64,
    pub weight_sentiment: f64,
    pub weight_management: f64,
    pub min_fundamental: f64,
    pub min_management: f64,
    pub min_backtest_win_rate: f64,
    /// Win rate at which the technical score gets a bonus.
    pub bonus_win_rate: f64,
    pub technical_bonus: f64,
    pub strong_buy_threshold: f64,
    pub buy_threshold: f64,
    pub watchlist_threshold: f64,
    pub strong_buy_size: f64,
    pub buy_size: f64,
    pub borderline_low: f64,
    pub borderline_high: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        DecisionConfig {
            weight_fundamental: 0.30,
            weight_technical: 0.30,
            weight_sentiment: 0.20,
            weight_management: 0.20,
            min_fundamental: 50.0,
            min_management: 40.0,
            min_backtest_win_rate: 70.0,
            bonus_win_rate: 80.0,
            technical_bonus: 5.0,
            strong_buy_threshold: 80.0,
            buy_threshold: 70.0,
            watchlist_threshold: 60.0,
            strong_buy_size: 0.05,
            buy_size: 0.03,
            borderline_low: 68.0,
            borderline_high: 73.0,
        }
    }
}

impl DecisionConfig {
    pub fn weight_sum(&self) -> f64 {
        self.weight_fundamental + self.weight_technical + self.weight_sentiment + self.weight_management
    }

    fn action_for(&self, composite: f64) -> (Action, f64) {
        if composite >= self.strong_buy_threshold {
            (Action::StrongBuy, self.strong_buy_size)
        } else if composite >= self.buy_threshold {
            (Action::Buy, self.buy_size)
        } else if composite >= self.watchlist_threshold {
            (Action::Watchlist, 0.0)
        } else {
            (Action::Reject, 0.0)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub action: Action,
    /// Absent when a veto fired.
    pub composite: Option<f64>,
    /// Fraction of portfolio.
    pub position_size: f64,
    pub vetoes: Vec<VetoCheck>,
    /// Technical score after any win-rate bonus.
    pub technical_adjusted: f64,
    /// Composite close to the buy threshold; worth a human look.
    pub borderline: bool,
    pub scores: Vec<DimensionScore>,
}

impl Decision {
    /// Reason of the veto that fired, if any.
    pub fn veto_reason(&self) -> Option<&'static str> {
        self.vetoes.iter().find(|c| !c.passed).map(|c| c.veto.reason())
    }
}

fn check(veto: Veto, passed: bool, detail: String) -> VetoCheck {
    VetoCheck { veto, passed, detail }
}

pub fn synthesize(
    symbol: &str,
    fundamental: &DimensionScore,
    technical: &TechnicalScore,
    sentiment: &DimensionScore,
    management: &DimensionScore,
    config: &DecisionConfig,
) -> Decision {
    let win_rate = technical.win_rate();
    let checks = [
        check(
            Veto::WeakFundamentals,
            fundamental.score >= config.min_fundamental,
            format!("fundamental {:.1} vs floor {:.1}", fundamental.score, config.min_fundamental),
        ),
        check(
            Veto::PoorManagement,
            management.score >= config.min_management,
            format!("management {:.1} vs floor {:.1}", management.score, config.min_management),
        ),
        check(
            Veto::NotBacktestValidated,
            technical.verdict.validated,
            technical
                .verdict
                .reason()
                .unwrap_or("validated")
                .to_string(),
        ),
        check(
            Veto::LowBacktestWinRate,
            win_rate >= config.min_backtest_win_rate,
            format!("win rate {:.1}% vs floor {:.1}%", win_rate, config.min_backtest_win_rate),
        ),
    ];

    let mut vetoes = Vec::with_capacity(checks.len());
    for c in checks {
        let passed = c.passed;
        vetoes.push(c);
        if !passed {
            break;
        }
    }
    let vetoed = vetoes.last().is_some_and(|c| !c.passed);

    let technical_adjusted = if win_rate >= config.bonus_win_rate {
        (technical.score.score + config.technical_bonus).min(100.0)
    } else {
        technical.score.score
    };

    let scores = vec![
        fundamental.clone(),
        technical.score.clone(),
        sentiment.clone(),
        management.clone(),
    ];

    if vetoed {
        return Decision {
            symbol: symbol.to_string(),
            action: Action::Reject,
            composite: None,
            position_size: 0.0,
            vetoes,
            technical_adjusted,
            borderline: false,
            scores,
        };
    }

    let composite = config.weight_fundamental * fundamental.score
        + config.weight_technical * technical_adjusted
        + config.weight_sentiment * sentiment.score
        + config.weight_management * management.score;
    let (action, position_size) = config.action_for(composite);

    Decision {
        symbol: symbol.to_string(),
        action,
        composite: Some(composite),
        position_size,
        vetoes,
        technical_adjusted,
        borderline: (config.borderline_low..=config.borderline_high).contains(&composite),
        scores,
    }
}
