//! Chart pattern detection.
//!
//! Each [`PatternKind`] has one scanner that answers "does a formation of
//! this kind confirm on bar `i`?". [`detect`] walks the bars forward and
//! yields candidates lazily in confirmation order. The iterator borrows the
//! bars and keeps no state between calls, so calling [`detect`] again
//! restarts the scan from the beginning.

pub mod cup_handle;
pub mod golden_cross;
pub mod head_shoulders;
pub mod pivots;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StratgateError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::ohlcv::Bar;
use cup_handle::{CupHandleParams, CupHandleScanner};
use golden_cross::{GoldenCrossParams, GoldenCrossScanner};
use head_shoulders::{HeadShouldersParams, HeadShouldersScanner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    GoldenCross,
    ReverseHeadShoulder,
    CupWithHandle,
}

impl PatternKind {
    pub const ALL: [PatternKind; 3] = [
        PatternKind::GoldenCross,
        PatternKind::ReverseHeadShoulder,
        PatternKind::CupWithHandle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::GoldenCross => "GOLDEN_CROSS",
            PatternKind::ReverseHeadShoulder => "REVERSE_HEAD_SHOULDER",
            PatternKind::CupWithHandle => "CUP_WITH_HANDLE",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternKind {
    type Err = StratgateError;

    /// Accepts the canonical names case-insensitively, with `-` or `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        PatternKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| StratgateError::UnknownStrategy(s.to_string()))
    }
}

/// Which bars formed a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Provenance {
    GoldenCross {
        short_sma: f64,
        long_sma: f64,
    },
    ReverseHeadShoulder {
        left_shoulder: usize,
        left_peak: usize,
        head: usize,
        right_peak: usize,
        right_shoulder: usize,
        /// Neckline value on the confirmation bar.
        neckline: f64,
    },
    CupWithHandle {
        left_rim: usize,
        bottom: usize,
        right_rim: usize,
        handle_low: f64,
        handle_bars: usize,
        depth_pct: f64,
    },
}

/// A confirmed formation. Indices refer to the bar slice it was detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCandidate {
    pub kind: PatternKind,
    pub confirmation_index: usize,
    pub confirmation_date: NaiveDate,
    /// Close of the confirmation bar.
    pub breakout_price: f64,
    pub target: f64,
    pub invalidation: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorParams {
    pub golden_cross: GoldenCrossParams,
    pub head_shoulders: HeadShouldersParams,
    pub cup_handle: CupHandleParams,
}

impl DetectorParams {
    /// Fewest bars a series needs before `kind` can confirm at all.
    pub fn min_lookback(&self, kind: PatternKind) -> usize {
        match kind {
            PatternKind::GoldenCross => self.golden_cross.min_lookback(),
            PatternKind::ReverseHeadShoulder => self.head_shoulders.min_lookback(),
            PatternKind::CupWithHandle => self.cup_handle.min_lookback(),
        }
    }
}

enum Scanner<'a> {
    GoldenCross(GoldenCrossScanner<'a>),
    HeadShoulders(HeadShouldersScanner<'a>),
    CupHandle(CupHandleScanner<'a>),
}

impl Scanner<'_> {
    fn confirm_at(&self, i: usize) -> Option<PatternCandidate> {
        match self {
            Scanner::GoldenCross(s) => s.confirm_at(i),
            Scanner::HeadShoulders(s) => s.confirm_at(i),
            Scanner::CupHandle(s) => s.confirm_at(i),
        }
    }
}

/// Lazy, finite sequence of candidates in confirmation order.
pub struct Detections<'a> {
    scanner: Option<Scanner<'a>>,
    cursor: usize,
    end: usize,
}

impl Iterator for Detections<'_> {
    type Item = PatternCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        let scanner = self.scanner.as_ref()?;
        while self.cursor < self.end {
            let i = self.cursor;
            self.cursor += 1;
            if let Some(candidate) = scanner.confirm_at(i) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Scan `bars` for confirmations of `kind`.
///
/// A series shorter than the kind's minimum lookback yields nothing.
pub fn detect<'a>(bars: &'a [Bar], kind: PatternKind, params: &DetectorParams) -> Detections<'a> {
    if bars.len() < params.min_lookback(kind) {
        return Detections {
            scanner: None,
            cursor: 0,
            end: 0,
        };
    }

    let scanner = match kind {
        PatternKind::GoldenCross => {
            Scanner::GoldenCross(GoldenCrossScanner::new(bars, &params.golden_cross))
        }
        PatternKind::ReverseHeadShoulder => {
            Scanner::HeadShoulders(HeadShouldersScanner::new(bars, &params.head_shoulders))
        }
        PatternKind::CupWithHandle => {
            Scanner::CupHandle(CupHandleScanner::new(bars, &params.cup_handle))
        }
    };

    Detections {
        scanner: Some(scanner),
        cursor: 0,
        end: bars.len(),
    }
}

/// Volume on bar `i` is at least `multiplier` times the average of the
/// bars before it. `volume_sma` must be the trailing volume SMA of `bars`.
pub(crate) fn volume_confirms(
    bars: &[Bar],
    volume_sma: &IndicatorSeries,
    i: usize,
    multiplier: f64,
) -> bool {
    if i == 0 || i >= bars.len() {
        return false;
    }
    match volume_sma.value_at(i - 1) {
        Some(avg) => bars[i].volume as f64 >= avg * multiplier,
        None => false,
    }
}
