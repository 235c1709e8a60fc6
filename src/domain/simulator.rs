//! Bar-by-bar replay of pattern candidates into simulated trades.
//!
//! Conventions:
//! - Entry fills at the confirmation bar's close (default) or the next
//!   bar's open ([`EntryFill::NextOpen`]).
//! - Exits are evaluated on closes. Invalidation is checked before target,
//!   so a close that satisfies both is a loss.
//! - The fill bar's own close is checked: a close already at or through a
//!   level closes the trade on that bar.
//! - Exits on a bar free their slot before that bar's fills open, for both
//!   fill modes.
//! - Holding days count bars from the entry bar (inclusive) to the exit bar
//!   (exclusive). Open trades count up to the last bar.
//! - Trades still open when the data ends stay open.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::ohlcv::Bar;
use crate::domain::pattern::{PatternCandidate, PatternKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryFill {
    #[default]
    ConfirmationClose,
    NextOpen,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub entry_fill: EntryFill,
    /// Open positions allowed at once for one symbol. `None` is unlimited.
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Target,
    Invalidation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedTrade {
    pub symbol: String,
    pub strategy: PatternKind,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub holding_days: usize,
    /// Percent return, set once closed.
    pub return_pct: Option<f64>,
    pub candidate: PatternCandidate,
}

impl SimulatedTrade {
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some()
    }

    pub fn is_win(&self) -> bool {
        self.return_pct.is_some_and(|r| r > 0.0)
    }
}

pub fn percent_return(entry_price: f64, exit_price: f64) -> f64 {
    (exit_price - entry_price) / entry_price * 100.0
}

struct OpenPosition {
    trade: usize,
    entry_index: usize,
}

/// Check one close against a trade's levels. Invalidation wins ties.
fn exit_signal(close: f64, candidate: &PatternCandidate) -> Option<ExitReason> {
    if close <= candidate.invalidation {
        Some(ExitReason::Invalidation)
    } else if close >= candidate.target {
        Some(ExitReason::Target)
    } else {
        None
    }
}

fn close_trade(trade: &mut SimulatedTrade, bar: &Bar, reason: ExitReason, holding_days: usize) {
    trade.exit_date = Some(bar.date);
    trade.exit_price = Some(bar.close);
    trade.exit_reason = Some(reason);
    trade.holding_days = holding_days;
    trade.return_pct = Some(percent_return(trade.entry_price, bar.close));
}

/// Replay `candidates` (one strategy kind, detected on `bars`) and return
/// every trade opened, in entry order.
pub fn simulate(
    symbol: &str,
    bars: &[Bar],
    candidates: impl IntoIterator<Item = PatternCandidate>,
    config: &SimulationConfig,
) -> Vec<SimulatedTrade> {
    let mut pending: Vec<PatternCandidate> = candidates.into_iter().collect();
    pending.sort_by_key(|c| c.confirmation_index);

    let fill_offset = match config.entry_fill {
        EntryFill::ConfirmationClose => 0,
        EntryFill::NextOpen => 1,
    };

    let mut trades: Vec<SimulatedTrade> = Vec::with_capacity(pending.len());
    let mut open: Vec<OpenPosition> = Vec::new();
    let mut next = pending.into_iter().peekable();

    for (t, bar) in bars.iter().enumerate() {
        // Candidates whose fill bar is this one, in confirmation order.
        let mut fills = Vec::new();
        while let Some(c) = next.next_if(|c| c.confirmation_index + fill_offset <= t) {
            if c.confirmation_index + fill_offset < t {
                debug!(symbol, index = c.confirmation_index, "candidate outside bar range, skipped");
                continue;
            }
            fills.push(c);
        }

        open.retain(|pos| {
            let trade = &mut trades[pos.trade];
            match exit_signal(bar.close, &trade.candidate) {
                Some(reason) => {
                    close_trade(trade, bar, reason, t - pos.entry_index);
                    false
                }
                None => true,
            }
        });

        let fill_price = match config.entry_fill {
            EntryFill::ConfirmationClose => bar.close,
            EntryFill::NextOpen => bar.open,
        };
        for candidate in fills {
            open_position(symbol, bar, t, fill_price, candidate, config, &mut trades, &mut open);
        }
    }

    if let Some(last) = bars.len().checked_sub(1) {
        for pos in &open {
            trades[pos.trade].holding_days = last - pos.entry_index;
        }
    }
    for skipped in next {
        debug!(symbol, index = skipped.confirmation_index, "no fill bar for candidate");
    }

    trades
}

#[allow(clippy::too_many_arguments)]
fn open_position(
    symbol: &str,
    bar: &Bar,
    t: usize,
    entry_price: f64,
    candidate: PatternCandidate,
    config: &SimulationConfig,
    trades: &mut Vec<SimulatedTrade>,
    open: &mut Vec<OpenPosition>,
) {
    if config.max_concurrent.is_some_and(|limit| open.len() >= limit) {
        debug!(symbol, date = %bar.date, "concurrent position limit reached, candidate skipped");
        return;
    }

    let mut trade = SimulatedTrade {
        symbol: symbol.to_string(),
        strategy: candidate.kind,
        entry_date: bar.date,
        entry_price,
        exit_date: None,
        exit_price: None,
        exit_reason: None,
        holding_days: 0,
        return_pct: None,
        candidate,
    };

    if let Some(reason) = exit_signal(bar.close, &trade.candidate) {
        close_trade(&mut trade, bar, reason, 0);
        trades.push(trade);
        return;
    }

    open.push(OpenPosition {
        trade: trades.len(),
        entry_index: t,
    });
    trades.push(trade);
}
