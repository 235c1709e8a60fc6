#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use stratgate::domain::cache::CacheKey;
use stratgate::domain::error::StratgateError;
pub use stratgate::domain::ohlcv::Bar;
use stratgate::domain::params::ValidationSettings;
use stratgate::domain::verdict::ValidationVerdict;
use stratgate::ports::cache_port::VerdictStore;
use stratgate::ports::clock_port::Clock;
use stratgate::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub delay: Option<std::time::Duration>,
    fetches: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            delay: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    /// Slow every fetch down so concurrent callers overlap.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, StratgateError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(reason) = self.errors.get(symbol) {
            return Err(StratgateError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, StratgateError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Clock that only moves when told to.
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

/// Verdict store whose backend is always down.
pub struct FailingStore;

impl VerdictStore for FailingStore {
    fn load(&self, _key: &CacheKey) -> Result<Option<ValidationVerdict>, StratgateError> {
        Err(StratgateError::CacheUnavailable {
            reason: "connection refused".into(),
        })
    }

    fn save(&self, _key: &CacheKey, _verdict: &ValidationVerdict) -> Result<(), StratgateError> {
        Err(StratgateError::CacheUnavailable {
            reason: "connection refused".into(),
        })
    }

    fn purge_before(&self, _cutoff: DateTime<Utc>) -> Result<usize, StratgateError> {
        Err(StratgateError::CacheUnavailable {
            reason: "connection refused".into(),
        })
    }
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 21, 0, 0).unwrap()
}

/// Settings with a fast SMA(2)/SMA(4) crossover so small fixtures produce
/// many trades.
pub fn fast_cross_settings() -> ValidationSettings {
    let mut settings = ValidationSettings::default();
    settings.detector.golden_cross.short_window = 2;
    settings.detector.golden_cross.long_window = 4;
    settings
}

/// Closes for a run of golden-cross cycles. Each cycle falls six bars by 3%,
/// then rises two bars by 3%, which crosses SMA(2) over SMA(4) on the second
/// rise. A winning cycle keeps rising for eight more bars (+12.55% from the
/// cross, through a 10% target); a losing cycle drops 10% on the next bar
/// (through a 5% stop) and then holds.
pub fn cycle_closes(outcomes: &[bool]) -> Vec<f64> {
    let mut closes = vec![100.0; 6];
    let mut price = 100.0_f64;
    for &win in outcomes {
        for _ in 0..6 {
            price *= 0.97;
            closes.push(price);
        }
        for _ in 0..2 {
            price *= 1.03;
            closes.push(price);
        }
        if win {
            for _ in 0..8 {
                price *= 1.03;
                closes.push(price);
            }
        } else {
            price *= 0.90;
            closes.push(price);
            closes.push(price);
        }
    }
    closes
}

/// Daily bars for `closes`, the last one dated `end`.
pub fn bars_from_closes(symbol: &str, closes: &[f64], end: NaiveDate) -> Vec<Bar> {
    let start = end - Duration::days(closes.len() as i64 - 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: symbol.to_string(),
                date: start + Duration::days(i as i64),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1000,
            }
        })
        .collect()
}

pub fn cycle_bars(symbol: &str, outcomes: &[bool], end: NaiveDate) -> Vec<Bar> {
    bars_from_closes(symbol, &cycle_closes(outcomes), end)
}

/// Seven wins and one loss: 8 closed trades, 87.5% win rate, -10% drawdown.
pub fn strong_history(symbol: &str, end: NaiveDate) -> Vec<Bar> {
    cycle_bars(symbol, &[true, true, true, false, true, true, true, true], end)
}

/// One win, two losses.
pub fn weak_history(symbol: &str, end: NaiveDate) -> Vec<Bar> {
    cycle_bars(symbol, &[true, false, false], end)
}

pub fn flat_bars(symbol: &str, count: usize, end: NaiveDate) -> Vec<Bar> {
    bars_from_closes(symbol, &vec![100.0; count], end)
}
