//! Local swing highs and lows.
//!
//! A pivot of order `k` at index `j` needs `k` bars on each side, so it is
//! only knowable once bar `j + k` has printed. Detectors must not use a
//! pivot before that bar.

use crate::domain::ohlcv::Bar;

/// Indices whose low is strictly below the `order` lows before it and no
/// higher than the `order` lows after it.
pub fn pivot_lows(bars: &[Bar], order: usize) -> Vec<usize> {
    pivots(bars, order, |a, b| a.low < b.low, |a, b| a.low <= b.low)
}

/// Indices whose high is strictly above the `order` highs before it and no
/// lower than the `order` highs after it.
pub fn pivot_highs(bars: &[Bar], order: usize) -> Vec<usize> {
    pivots(bars, order, |a, b| a.high > b.high, |a, b| a.high >= b.high)
}

fn pivots(
    bars: &[Bar],
    order: usize,
    beats_left: impl Fn(&Bar, &Bar) -> bool,
    beats_right: impl Fn(&Bar, &Bar) -> bool,
) -> Vec<usize> {
    if order == 0 || bars.len() < 2 * order + 1 {
        return Vec::new();
    }

    (order..bars.len() - order)
        .filter(|&j| {
            let pivot = &bars[j];
            bars[j - order..j].iter().all(|b| beats_left(pivot, b))
                && bars[j + 1..=j + order].iter().all(|b| beats_right(pivot, b))
        })
        .collect()
}
