//! Reverse (inverse) head-and-shoulders.
//!
//! Three consecutive swing lows inside the trailing window: the middle one
//! (head) is the deepest and the right shoulder sits above the left. The
//! neckline joins the highest highs between the shoulders and the head and
//! is extrapolated to the breakout bar. Confirmation is the first close
//! above the neckline on a volume surge.

use serde::{Deserialize, Serialize};

use super::pivots::pivot_lows;
use super::{PatternCandidate, PatternKind, Provenance, volume_confirms};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::sma::calculate_volume_sma;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadShouldersParams {
    /// The whole formation, left shoulder through breakout, must fit in
    /// this many bars.
    pub window: usize,
    pub pivot_order: usize,
    pub volume_window: usize,
    pub volume_multiplier: f64,
}

impl Default for HeadShouldersParams {
    fn default() -> Self {
        HeadShouldersParams {
            window: 100,
            pivot_order: 5,
            volume_window: 20,
            volume_multiplier: 1.5,
        }
    }
}

impl HeadShouldersParams {
    pub fn min_lookback(&self) -> usize {
        self.window.max(self.volume_window + 1)
    }
}

/// Neckline through the two bounding peaks, evaluated at `x`.
fn neckline_at(bars: &[Bar], left_peak: usize, right_peak: usize, x: usize) -> f64 {
    let y1 = bars[left_peak].high;
    let y2 = bars[right_peak].high;
    let slope = (y2 - y1) / (right_peak - left_peak) as f64;
    y1 + slope * (x as f64 - left_peak as f64)
}

fn highest_high(bars: &[Bar], from: usize, to: usize) -> Option<usize> {
    (from..to).reduce(|best, j| if bars[j].high > bars[best].high { j } else { best })
}

pub(crate) struct HeadShouldersScanner<'a> {
    bars: &'a [Bar],
    troughs: Vec<usize>,
    volume_sma: IndicatorSeries,
    params: HeadShouldersParams,
}

impl<'a> HeadShouldersScanner<'a> {
    pub(crate) fn new(bars: &'a [Bar], params: &HeadShouldersParams) -> Self {
        HeadShouldersScanner {
            bars,
            troughs: pivot_lows(bars, params.pivot_order),
            volume_sma: calculate_volume_sma(bars, params.volume_window),
            params: params.clone(),
        }
    }

    pub(crate) fn confirm_at(&self, i: usize) -> Option<PatternCandidate> {
        let bars = self.bars;
        let order = self.params.pivot_order;

        if !volume_confirms(bars, &self.volume_sma, i, self.params.volume_multiplier) {
            return None;
        }

        for triple in self.troughs.windows(3) {
            let (ls, head, rs) = (triple[0], triple[1], triple[2]);

            if ls + self.params.window <= i {
                continue;
            }
            // The right shoulder is only known once `order` bars follow it.
            if rs + order >= i {
                break;
            }

            let (ls_low, head_low, rs_low) = (bars[ls].low, bars[head].low, bars[rs].low);
            if !(head_low < ls_low && head_low < rs_low && rs_low > ls_low) {
                continue;
            }

            let (Some(left_peak), Some(right_peak)) = (
                highest_high(bars, ls + 1, head),
                highest_high(bars, head + 1, rs),
            ) else {
                continue;
            };

            let neckline = neckline_at(bars, left_peak, right_peak, i);
            if bars[i].close <= neckline {
                continue;
            }

            let already_resolved = (rs + 1..i).any(|j| {
                bars[j].close < rs_low
                    || (bars[j].close > neckline_at(bars, left_peak, right_peak, j)
                        && volume_confirms(bars, &self.volume_sma, j, self.params.volume_multiplier))
            });
            if already_resolved {
                continue;
            }

            return Some(PatternCandidate {
                kind: PatternKind::ReverseHeadShoulder,
                confirmation_index: i,
                confirmation_date: bars[i].date,
                breakout_price: bars[i].close,
                target: neckline + (neckline - head_low),
                invalidation: rs_low,
                provenance: Provenance::ReverseHeadShoulder {
                    left_shoulder: ls,
                    left_peak,
                    head,
                    right_peak,
                    right_shoulder: rs,
                    neckline,
                },
            });
        }

        None
    }
}
