//! Simple moving averages over closes and volume.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    rolling_mean(bars, period, |b| b.close)
}

pub fn calculate_volume_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    rolling_mean(bars, period, |b| b.volume as f64)
}

fn rolling_mean(bars: &[Bar], period: usize, field: impl Fn(&Bar) -> f64) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0_f64;

    for (i, bar) in bars.iter().enumerate() {
        sum += field(bar);
        if period > 0 && i >= period {
            sum -= field(&bars[i - period]);
        }
        let valid = period > 0 && i + 1 >= period;
        values.push(IndicatorPoint {
            valid,
            value: if valid { sum / period as f64 } else { 0.0 },
        });
    }

    IndicatorSeries { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<Bar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: (i as i64 + 1) * 100,
            })
            .collect()
    }

    #[test]
    fn sma_warmup() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0]);
        let series = calculate_sma(&bars, 3);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert_eq!(series.values.len(), 4);
    }

    #[test]
    fn sma_values() {
        let bars = make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&bars, 3);
        assert!((series.value_at(2).unwrap() - 20.0).abs() < 1e-9);
        assert!((series.value_at(3).unwrap() - 30.0).abs() < 1e-9);
        assert!((series.value_at(4).unwrap() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn volume_sma_values() {
        let bars = make_bars(&[1.0, 1.0, 1.0, 1.0]);
        let series = calculate_volume_sma(&bars, 2);
        assert_eq!(series.values.len(), bars.len());
        assert!((series.value_at(1).unwrap() - 150.0).abs() < 1e-9);
        assert!((series.value_at(3).unwrap() - 350.0).abs() < 1e-9);
    }

    #[test]
    fn zero_period_is_never_valid() {
        let bars = make_bars(&[1.0, 2.0]);
        let series = calculate_sma(&bars, 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn period_longer_than_series() {
        let bars = make_bars(&[1.0, 2.0]);
        let series = calculate_sma(&bars, 5);
        assert_eq!(series.value_at(1), None);
    }
}
