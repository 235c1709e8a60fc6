//! Acceptance rules and the validation verdict.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{DEFAULT_MIN_SAMPLE, ValidationMetrics};
use super::pattern::PatternKind;

/// Thresholds a backtest must meet, checked in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    pub min_closed_trades: usize,
    /// Percent.
    pub min_win_rate: f64,
    pub min_profit_factor: f64,
    /// Percent, negative. Drawdowns deeper than this fail.
    pub max_drawdown: f64,
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        AcceptanceCriteria {
            min_closed_trades: DEFAULT_MIN_SAMPLE,
            min_win_rate: 70.0,
            min_profit_factor: 1.5,
            max_drawdown: -25.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionRule {
    InsufficientData,
    InsufficientSample,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub rule: RejectionRule,
    pub reason: String,
}

impl Rejection {
    pub fn new(rule: RejectionRule, reason: impl Into<String>) -> Self {
        Rejection {
            rule,
            reason: reason.into(),
        }
    }
}

impl AcceptanceCriteria {
    /// First failing rule, or `None` when every rule passes.
    pub fn evaluate(&self, metrics: &ValidationMetrics) -> Option<Rejection> {
        if metrics.closed_trades < self.min_closed_trades {
            return Some(Rejection::new(
                RejectionRule::InsufficientSample,
                format!(
                    "insufficient sample: {} closed trades, need at least {}",
                    metrics.closed_trades, self.min_closed_trades
                ),
            ));
        }
        if metrics.win_rate < self.min_win_rate {
            return Some(Rejection::new(
                RejectionRule::WinRate,
                format!(
                    "win rate {:.1}% below {:.1}% threshold",
                    metrics.win_rate, self.min_win_rate
                ),
            ));
        }
        if metrics.profit_factor < self.min_profit_factor {
            return Some(Rejection::new(
                RejectionRule::ProfitFactor,
                format!(
                    "profit factor {:.2} below {:.2} threshold",
                    metrics.profit_factor, self.min_profit_factor
                ),
            ));
        }
        if metrics.max_drawdown < self.max_drawdown {
            return Some(Rejection::new(
                RejectionRule::MaxDrawdown,
                format!(
                    "max drawdown {:.1}% exceeds {:.1}% limit",
                    metrics.max_drawdown, self.max_drawdown
                ),
            ));
        }
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub symbol: String,
    pub strategy: PatternKind,
    /// Hash of the parameters that produced this verdict.
    pub fingerprint: String,
    pub validated: bool,
    pub metrics: ValidationMetrics,
    pub rejection: Option<Rejection>,
    pub bars_evaluated: usize,
    pub evaluated_at: DateTime<Utc>,
}

impl ValidationVerdict {
    pub fn from_metrics(
        symbol: &str,
        strategy: PatternKind,
        fingerprint: &str,
        metrics: ValidationMetrics,
        criteria: &AcceptanceCriteria,
        bars_evaluated: usize,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let rejection = criteria.evaluate(&metrics);
        ValidationVerdict {
            symbol: symbol.to_string(),
            strategy,
            fingerprint: fingerprint.to_string(),
            validated: rejection.is_none(),
            metrics,
            rejection,
            bars_evaluated,
            evaluated_at,
        }
    }

    /// Rejected before any simulation ran.
    pub fn insufficient_data(
        symbol: &str,
        strategy: PatternKind,
        fingerprint: &str,
        reason: impl Into<String>,
        bars_evaluated: usize,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        ValidationVerdict {
            symbol: symbol.to_string(),
            strategy,
            fingerprint: fingerprint.to_string(),
            validated: false,
            metrics: ValidationMetrics::empty(),
            rejection: Some(Rejection::new(RejectionRule::InsufficientData, reason)),
            bars_evaluated,
            evaluated_at,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.rejection.as_ref().map(|r| r.reason.as_str())
    }

    /// Fresh through `evaluated_at + ttl`, stale after.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now <= self.evaluated_at + ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn metrics(closed: usize, win_rate: f64, profit_factor: f64, max_drawdown: f64) -> ValidationMetrics {
        ValidationMetrics {
            closed_trades: closed,
            open_trades: 0,
            wins: (closed as f64 * win_rate / 100.0).round() as usize,
            losses: closed - (closed as f64 * win_rate / 100.0).round() as usize,
            win_rate,
            profit_factor,
            avg_return: 2.0,
            max_drawdown,
            risk_adjusted_return: None,
            avg_holding_days: 10.0,
            insufficient_sample: closed < DEFAULT_MIN_SAMPLE,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn strong_backtest_is_validated() {
        let v = ValidationVerdict::from_metrics(
            "AAPL",
            PatternKind::CupWithHandle,
            "fp",
            metrics(16, 75.0, 2.3, -8.2),
            &AcceptanceCriteria::default(),
            1250,
            at(),
        );
        assert!(v.validated);
        assert_eq!(v.rejection, None);
        assert_eq!(v.reason(), None);
    }

    #[test]
    fn small_sample_is_rejected_first() {
        let rejection = AcceptanceCriteria::default()
            .evaluate(&metrics(3, 33.3, 0.4, -40.0))
            .unwrap();
        assert_eq!(rejection.rule, RejectionRule::InsufficientSample);
        assert!(rejection.reason.contains("insufficient sample"));
    }

    #[test]
    fn low_win_rate_is_cited() {
        let criteria = AcceptanceCriteria {
            min_closed_trades: 3,
            ..Default::default()
        };
        let rejection = criteria.evaluate(&metrics(3, 33.3, 0.8, -6.0)).unwrap();
        assert_eq!(rejection.rule, RejectionRule::WinRate);
        assert!(rejection.reason.contains("win rate"));
    }

    #[test]
    fn weak_profit_factor_is_cited() {
        let rejection = AcceptanceCriteria::default()
            .evaluate(&metrics(10, 80.0, 1.2, -5.0))
            .unwrap();
        assert_eq!(rejection.rule, RejectionRule::ProfitFactor);
    }

    #[test]
    fn deep_drawdown_is_cited() {
        let rejection = AcceptanceCriteria::default()
            .evaluate(&metrics(10, 80.0, 2.0, -30.0))
            .unwrap();
        assert_eq!(rejection.rule, RejectionRule::MaxDrawdown);
        assert!(rejection.reason.contains("drawdown"));
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(
            AcceptanceCriteria::default().evaluate(&metrics(5, 70.0, 1.5, -25.0)),
            None
        );
    }

    #[test]
    fn insufficient_data_verdict() {
        let v = ValidationVerdict::insufficient_data(
            "NEWCO",
            PatternKind::GoldenCross,
            "fp",
            "insufficient data: 20 bars, need 51",
            20,
            at(),
        );
        assert!(!v.validated);
        assert_eq!(v.rejection.as_ref().unwrap().rule, RejectionRule::InsufficientData);
        assert_eq!(v.metrics.closed_trades, 0);
    }

    #[test]
    fn freshness_window() {
        let v = ValidationVerdict::insufficient_data("X", PatternKind::GoldenCross, "fp", "none", 0, at());
        let ttl = Duration::days(90);
        assert!(v.is_fresh(at() + Duration::days(89), ttl));
        assert!(v.is_fresh(at() + ttl, ttl));
        assert!(!v.is_fresh(at() + Duration::days(91), ttl));
    }

    #[test]
    fn verdict_serializes_to_json() {
        let v = ValidationVerdict::from_metrics(
            "AAPL",
            PatternKind::GoldenCross,
            "fp",
            metrics(8, 50.0, 1.1, -12.0),
            &AcceptanceCriteria::default(),
            900,
            at(),
        );
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"strategy\":\"GOLDEN_CROSS\""));
        assert!(json.contains("\"rule\":\"win_rate\""));
        let back: ValidationVerdict = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    proptest! {
        #[test]
        fn validated_iff_every_threshold_met(
            closed in 0usize..40,
            win_rate in 0.0f64..100.0,
            profit_factor in 0.0f64..5.0,
            max_drawdown in -60.0f64..0.0,
        ) {
            let criteria = AcceptanceCriteria::default();
            let m = metrics(closed, win_rate, profit_factor, max_drawdown);
            let v = ValidationVerdict::from_metrics("P", PatternKind::GoldenCross, "fp", m, &criteria, 500, at());
            let expected = closed >= criteria.min_closed_trades
                && win_rate >= criteria.min_win_rate
                && profit_factor >= criteria.min_profit_factor
                && max_drawdown >= criteria.max_drawdown;
            prop_assert_eq!(v.validated, expected);
            prop_assert_eq!(v.rejection.is_none(), expected);
        }
    }
}
