//! Summary statistics over a strategy's simulated trades.

use serde::{Deserialize, Serialize};

use super::simulator::SimulatedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Profit factor reported when there are wins and no losses.
pub const PROFIT_FACTOR_NO_LOSSES: f64 = 999.0;

/// Fewest closed trades for the statistics to mean anything.
pub const DEFAULT_MIN_SAMPLE: usize = 5;

/// Percent-valued fields use percent units (72.5 = 72.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub closed_trades: usize,
    pub open_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_return: f64,
    /// Deepest peak-to-trough fall of compounded closed-trade returns; <= 0.
    pub max_drawdown: f64,
    /// Annualized mean/stddev of per-trade returns. `None` when the sample
    /// is too small or has no dispersion.
    pub risk_adjusted_return: Option<f64>,
    pub avg_holding_days: f64,
    pub insufficient_sample: bool,
}

impl ValidationMetrics {
    /// Statistics for no trades at all.
    pub fn empty() -> Self {
        ValidationMetrics::compute(&[], DEFAULT_MIN_SAMPLE)
    }

    /// Only closed trades contribute. Open trades are counted, nothing more.
    pub fn compute(trades: &[SimulatedTrade], min_sample: usize) -> Self {
        let mut closed: Vec<&SimulatedTrade> = trades.iter().filter(|t| t.is_closed()).collect();
        let open_trades = trades.len() - closed.len();
        closed.sort_by_key(|t| (t.exit_date, t.entry_date));

        let returns: Vec<f64> = closed.iter().filter_map(|t| t.return_pct).collect();
        let closed_trades = returns.len();

        let mut wins = 0usize;
        let mut losses = 0usize;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        for &r in &returns {
            if r > 0.0 {
                wins += 1;
                gross_profit += r;
            } else {
                losses += 1;
                gross_loss += r.abs();
            }
        }

        let win_rate = if closed_trades > 0 {
            wins as f64 / closed_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if gross_loss > 0.0 {
            (gross_profit / gross_loss).min(PROFIT_FACTOR_NO_LOSSES)
        } else if wins > 0 {
            PROFIT_FACTOR_NO_LOSSES
        } else {
            0.0
        };

        let avg_return = if closed_trades > 0 {
            returns.iter().sum::<f64>() / closed_trades as f64
        } else {
            0.0
        };

        let avg_holding_days = if closed_trades > 0 {
            closed.iter().map(|t| t.holding_days as f64).sum::<f64>() / closed_trades as f64
        } else {
            0.0
        };

        let insufficient_sample = closed_trades < min_sample;
        let risk_adjusted_return = if insufficient_sample {
            None
        } else {
            compute_risk_adjusted(&returns, avg_holding_days)
        };

        ValidationMetrics {
            closed_trades,
            open_trades,
            wins,
            losses,
            win_rate,
            profit_factor,
            avg_return,
            max_drawdown: compute_drawdown(&returns),
            risk_adjusted_return,
            avg_holding_days,
            insufficient_sample,
        }
    }
}

/// `returns` in exit order, percent units.
fn compute_drawdown(returns: &[f64]) -> f64 {
    let mut equity = 1.0_f64;
    let mut peak = equity;
    let mut max_dd = 0.0_f64;

    for r in returns {
        equity *= 1.0 + r / 100.0;
        if equity > peak {
            peak = equity;
        } else if peak > 0.0 {
            let dd = (equity - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

fn compute_risk_adjusted(returns: &[f64], avg_holding_days: f64) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev <= 0.0 {
        return None;
    }
    let trades_per_year = TRADING_DAYS_PER_YEAR / avg_holding_days.max(1.0);
    Some(mean / stddev * trades_per_year.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{PatternCandidate, PatternKind, Provenance};
    use crate::domain::simulator::ExitReason;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + chrono::Duration::days(n)
    }

    fn trade(entry_day: i64, holding: usize, return_pct: Option<f64>) -> SimulatedTrade {
        let entry_price = 100.0;
        let exit_price = return_pct.map(|r| entry_price * (1.0 + r / 100.0));
        SimulatedTrade {
            symbol: "TEST".into(),
            strategy: PatternKind::GoldenCross,
            entry_date: day(entry_day),
            entry_price,
            exit_date: return_pct.map(|_| day(entry_day + holding as i64)),
            exit_price,
            exit_reason: return_pct.map(|r| {
                if r > 0.0 {
                    ExitReason::Target
                } else {
                    ExitReason::Invalidation
                }
            }),
            holding_days: holding,
            return_pct,
            candidate: PatternCandidate {
                kind: PatternKind::GoldenCross,
                confirmation_index: entry_day as usize,
                confirmation_date: day(entry_day),
                breakout_price: entry_price,
                target: 110.0,
                invalidation: 95.0,
                provenance: Provenance::GoldenCross {
                    short_sma: 0.0,
                    long_sma: 0.0,
                },
            },
        }
    }

    #[test]
    fn no_trades() {
        let m = ValidationMetrics::compute(&[], 5);
        assert_eq!(m.closed_trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.risk_adjusted_return, None);
        assert!(m.insufficient_sample);
        assert_eq!(m, ValidationMetrics::empty());
    }

    #[test]
    fn mixed_wins_and_losses() {
        let trades = vec![
            trade(0, 10, Some(10.0)),
            trade(20, 5, Some(-5.0)),
            trade(40, 8, Some(10.0)),
            trade(60, 4, Some(-5.0)),
            trade(80, 12, Some(10.0)),
        ];
        let m = ValidationMetrics::compute(&trades, 5);

        assert_eq!(m.closed_trades, 5);
        assert_eq!(m.wins, 3);
        assert_eq!(m.losses, 2);
        assert_relative_eq!(m.win_rate, 60.0);
        assert_relative_eq!(m.profit_factor, 3.0);
        assert_relative_eq!(m.avg_return, 4.0);
        assert_relative_eq!(m.avg_holding_days, 7.8);
        // Peak 1.1 after the first trade, then 1.045: -5%.
        assert_relative_eq!(m.max_drawdown, -5.0, epsilon = 1e-9);
        assert!(!m.insufficient_sample);
        assert!(m.risk_adjusted_return.unwrap() > 0.0);
    }

    #[test]
    fn open_trades_are_counted_but_ignored() {
        let trades = vec![trade(0, 3, Some(10.0)), trade(10, 7, None)];
        let m = ValidationMetrics::compute(&trades, 1);
        assert_eq!(m.closed_trades, 1);
        assert_eq!(m.open_trades, 1);
        assert_relative_eq!(m.win_rate, 100.0);
        assert_relative_eq!(m.avg_holding_days, 3.0);
    }

    #[test]
    fn breakeven_counts_as_loss() {
        let trades = vec![trade(0, 1, Some(0.0)), trade(5, 1, Some(4.0))];
        let m = ValidationMetrics::compute(&trades, 1);
        assert_eq!(m.wins, 1);
        assert_eq!(m.losses, 1);
        assert_relative_eq!(m.win_rate, 50.0);
        // A breakeven trade has no loss magnitude.
        assert_relative_eq!(m.profit_factor, PROFIT_FACTOR_NO_LOSSES);
    }

    #[test]
    fn drawdown_follows_exit_order() {
        // The loss exits before the win even though it was entered later.
        let trades = vec![trade(0, 30, Some(20.0)), trade(5, 5, Some(-10.0))];
        let m = ValidationMetrics::compute(&trades, 1);
        assert_relative_eq!(m.max_drawdown, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn consecutive_losses_compound() {
        let trades = vec![
            trade(0, 1, Some(-10.0)),
            trade(5, 1, Some(-10.0)),
            trade(10, 1, Some(50.0)),
        ];
        let m = ValidationMetrics::compute(&trades, 1);
        assert_relative_eq!(m.max_drawdown, -19.0, epsilon = 1e-9);
    }

    #[test]
    fn small_sample_has_no_risk_adjusted_return() {
        let trades = vec![trade(0, 2, Some(5.0)), trade(5, 2, Some(-2.0))];
        let m = ValidationMetrics::compute(&trades, 5);
        assert!(m.insufficient_sample);
        assert_eq!(m.risk_adjusted_return, None);
    }

    #[test]
    fn identical_returns_have_no_risk_adjusted_return() {
        let trades: Vec<_> = (0..6).map(|i| trade(i * 10, 2, Some(5.0))).collect();
        let m = ValidationMetrics::compute(&trades, 5);
        assert_eq!(m.risk_adjusted_return, None);
    }

    proptest! {
        #[test]
        fn all_winners_hit_the_sentinel(returns in proptest::collection::vec(0.01f64..50.0, 1..30)) {
            let trades: Vec<_> = returns
                .iter()
                .enumerate()
                .map(|(i, &r)| trade(i as i64 * 10, 3, Some(r)))
                .collect();
            let m = ValidationMetrics::compute(&trades, 5);
            prop_assert_eq!(m.profit_factor, PROFIT_FACTOR_NO_LOSSES);
            prop_assert_eq!(m.losses, 0);
            prop_assert_eq!(m.max_drawdown, 0.0);
            prop_assert!((m.win_rate - 100.0).abs() < 1e-9);
        }

        #[test]
        fn drawdown_is_never_positive(returns in proptest::collection::vec(-50.0f64..50.0, 0..30)) {
            let trades: Vec<_> = returns
                .iter()
                .enumerate()
                .map(|(i, &r)| trade(i as i64 * 10, 3, Some(r)))
                .collect();
            let m = ValidationMetrics::compute(&trades, 5);
            prop_assert!(m.max_drawdown <= 0.0);
            prop_assert!(m.max_drawdown >= -100.0);
        }
    }
}
