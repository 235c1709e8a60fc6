//! Cup with handle.
//!
//! A rounded decline-and-recovery between two swing highs of similar height
//! (the rims), followed by a shallow, short pullback off the right rim. The
//! breakout is the first close above both the right rim and every handle
//! high, on a volume surge. A handle bar that already closed above that
//! ceiling ends the pattern.

use serde::{Deserialize, Serialize};

use super::pivots::pivot_highs;
use super::{PatternCandidate, PatternKind, Provenance, volume_confirms};
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::sma::calculate_volume_sma;
use crate::domain::ohlcv::Bar;

/// All percentages are in percent units (12.0 = 12%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CupHandleParams {
    pub min_depth_pct: f64,
    pub max_depth_pct: f64,
    /// Handle decline as a share of the cup's depth.
    pub handle_max_retrace_pct: f64,
    pub handle_min_bars: usize,
    /// Handle length as a share of the cup's length.
    pub handle_max_fraction_pct: f64,
    pub min_cup_bars: usize,
    pub max_cup_bars: usize,
    /// How far the right rim may sit from the left rim.
    pub rim_tolerance_pct: f64,
    pub pivot_order: usize,
    pub volume_window: usize,
    pub volume_multiplier: f64,
    /// Invalidation distance below the handle low.
    pub stop_buffer_pct: f64,
}

impl Default for CupHandleParams {
    fn default() -> Self {
        CupHandleParams {
            min_depth_pct: 12.0,
            max_depth_pct: 33.0,
            handle_max_retrace_pct: 15.0,
            handle_min_bars: 5,
            handle_max_fraction_pct: 30.0,
            min_cup_bars: 30,
            max_cup_bars: 250,
            rim_tolerance_pct: 5.0,
            pivot_order: 5,
            volume_window: 20,
            volume_multiplier: 1.5,
            stop_buffer_pct: 3.0,
        }
    }
}

impl CupHandleParams {
    pub fn min_lookback(&self) -> usize {
        (self.min_cup_bars + self.handle_min_bars + 2).max(self.volume_window + 1)
    }

    fn max_handle_bars(&self, cup_bars: usize) -> usize {
        (cup_bars as f64 * self.handle_max_fraction_pct / 100.0).floor() as usize
    }
}

pub(crate) struct CupHandleScanner<'a> {
    bars: &'a [Bar],
    peaks: Vec<usize>,
    volume_sma: IndicatorSeries,
    params: CupHandleParams,
}

impl<'a> CupHandleScanner<'a> {
    pub(crate) fn new(bars: &'a [Bar], params: &CupHandleParams) -> Self {
        CupHandleScanner {
            bars,
            peaks: pivot_highs(bars, params.pivot_order),
            volume_sma: calculate_volume_sma(bars, params.volume_window),
            params: params.clone(),
        }
    }

    pub(crate) fn confirm_at(&self, i: usize) -> Option<PatternCandidate> {
        let bars = self.bars;
        let p = &self.params;

        if !volume_confirms(bars, &self.volume_sma, i, p.volume_multiplier) {
            return None;
        }
        let longest_handle = p.max_handle_bars(p.max_cup_bars);

        // Most recent right rim first: handle length grows as we walk back.
        for (pos, &right) in self.peaks.iter().enumerate().rev() {
            if right + p.pivot_order >= i {
                continue;
            }
            let handle_bars = i - right - 1;
            if handle_bars > longest_handle {
                break;
            }
            if handle_bars < p.handle_min_bars {
                continue;
            }

            let handle = &bars[right + 1..i];
            // Ceiling each handle bar must stay under: rim plus earlier handle highs.
            let mut ceiling = bars[right].high;
            let mut resolved = false;
            for b in handle {
                if b.close > ceiling {
                    resolved = true;
                    break;
                }
                ceiling = ceiling.max(b.high);
            }
            if resolved || bars[i].close <= ceiling {
                continue;
            }
            let handle_low = handle.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

            for &left in self.peaks[..pos].iter().rev() {
                let cup_bars = right - left;
                if cup_bars < p.min_cup_bars {
                    continue;
                }
                if cup_bars > p.max_cup_bars {
                    break;
                }
                if let Some(candidate) = self.try_cup(left, right, i, handle_low) {
                    return Some(candidate);
                }
            }
        }

        None
    }

    fn try_cup(&self, left: usize, right: usize, i: usize, handle_low: f64) -> Option<PatternCandidate> {
        let bars = self.bars;
        let p = &self.params;
        let cup_bars = right - left;
        let rim_left = bars[left].high;
        let rim_right = bars[right].high;

        let tolerance = rim_left * p.rim_tolerance_pct / 100.0;
        if (rim_right - rim_left).abs() > tolerance {
            return None;
        }

        let interior = &bars[left + 1..right];
        if interior.iter().any(|b| b.high > rim_left.max(rim_right)) {
            return None;
        }
        let bottom = (left + 1..right).reduce(|best, j| if bars[j].low < bars[best].low { j } else { best })?;

        let depth = rim_left - bars[bottom].low;
        let depth_pct = depth / rim_left * 100.0;
        if depth_pct < p.min_depth_pct || depth_pct > p.max_depth_pct {
            return None;
        }

        // U rather than V: the bottom sits away from both rims.
        let margin = cup_bars / 5;
        if bottom - left < margin || right - bottom < margin {
            return None;
        }

        let handle_bars = i - right - 1;
        if handle_bars > p.max_handle_bars(cup_bars) {
            return None;
        }
        if rim_right - handle_low > depth * p.handle_max_retrace_pct / 100.0 {
            return None;
        }

        let breakout = bars[i].close;
        Some(PatternCandidate {
            kind: PatternKind::CupWithHandle,
            confirmation_index: i,
            confirmation_date: bars[i].date,
            breakout_price: breakout,
            target: breakout + depth,
            invalidation: handle_low * (1.0 - p.stop_buffer_pct / 100.0),
            provenance: Provenance::CupWithHandle {
                left_rim: left,
                bottom,
                right_rim: right,
                handle_low,
                handle_bars,
                depth_pct,
            },
        })
    }
}
