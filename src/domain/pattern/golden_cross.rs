//! Moving-average crossover: the short SMA closes above the long SMA after
//! closing at or below it on the previous bar.

use serde::{Deserialize, Serialize};

use super::{PatternCandidate, PatternKind, Provenance};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenCrossParams {
    pub short_window: usize,
    pub long_window: usize,
    /// Target distance above the confirmation close, in percent.
    pub target_pct: f64,
    /// Invalidation distance below the confirmation close, in percent.
    pub stop_pct: f64,
}

impl Default for GoldenCrossParams {
    fn default() -> Self {
        GoldenCrossParams {
            short_window: 20,
            long_window: 50,
            target_pct: 10.0,
            stop_pct: 5.0,
        }
    }
}

impl GoldenCrossParams {
    /// Both averages must be valid on the bar before the cross.
    pub fn min_lookback(&self) -> usize {
        self.long_window.max(self.short_window) + 1
    }
}

pub(crate) struct GoldenCrossScanner<'a> {
    bars: &'a [Bar],
    short: IndicatorSeries,
    long: IndicatorSeries,
    params: GoldenCrossParams,
}

impl<'a> GoldenCrossScanner<'a> {
    pub(crate) fn new(bars: &'a [Bar], params: &GoldenCrossParams) -> Self {
        GoldenCrossScanner {
            bars,
            short: calculate_sma(bars, params.short_window),
            long: calculate_sma(bars, params.long_window),
            params: params.clone(),
        }
    }

    pub(crate) fn confirm_at(&self, i: usize) -> Option<PatternCandidate> {
        if i == 0 {
            return None;
        }
        let prev_short = self.short.value_at(i - 1)?;
        let prev_long = self.long.value_at(i - 1)?;
        let short = self.short.value_at(i)?;
        let long = self.long.value_at(i)?;

        if !(prev_short <= prev_long && short > long) {
            return None;
        }

        let bar = &self.bars[i];
        Some(PatternCandidate {
            kind: PatternKind::GoldenCross,
            confirmation_index: i,
            confirmation_date: bar.date,
            breakout_price: bar.close,
            target: bar.close * (1.0 + self.params.target_pct / 100.0),
            invalidation: bar.close * (1.0 - self.params.stop_pct / 100.0),
            provenance: Provenance::GoldenCross {
                short_sma: short,
                long_sma: long,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pattern::{DetectorParams, detect};
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn small_params() -> DetectorParams {
        DetectorParams {
            golden_cross: GoldenCrossParams {
                short_window: 2,
                long_window: 4,
                target_pct: 10.0,
                stop_pct: 5.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn detects_cross_up() {
        // Falling then rising: SMA(2) overtakes SMA(4) once.
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0, 6.0, 8.0, 11.0, 13.0]);
        let found: Vec<_> = detect(&bars, PatternKind::GoldenCross, &small_params()).collect();
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.confirmation_index, 6);
        assert!((c.breakout_price - 11.0).abs() < f64::EPSILON);
        assert!((c.target - 12.1).abs() < 1e-9);
        assert!((c.invalidation - 10.45).abs() < 1e-9);
    }

    #[test]
    fn no_candidate_without_prior_long_window() {
        // Rising from the start: SMA(2) > SMA(4) as soon as both exist, no cross.
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let found: Vec<_> = detect(&bars, PatternKind::GoldenCross, &small_params()).collect();
        assert!(found.is_empty());
    }

    #[test]
    fn repeated_crosses_are_all_reported_in_order() {
        let bars = make_bars(&[
            10.0, 9.0, 8.0, 7.0, 6.0, 8.0, 11.0, 13.0, 9.0, 6.0, 4.0, 3.0, 6.0, 10.0,
        ]);
        let found: Vec<_> = detect(&bars, PatternKind::GoldenCross, &small_params()).collect();
        assert_eq!(found.len(), 2);
        assert!(found[0].confirmation_index < found[1].confirmation_index);
    }

    #[test]
    fn default_lookback() {
        assert_eq!(GoldenCrossParams::default().min_lookback(), 51);
    }
}
