//! Backtest-gated strategy validation.
//!
//! `validate` answers "does this pattern kind have a good enough track record
//! on this symbol?". Answers come from the cache while fresh; otherwise the
//! last few years of bars are fetched, scanned, simulated and scored, and the
//! result is cached. Concurrent requests for the same key compute once.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cache::{CacheKey, ValidationCache};
use super::error::StratgateError;
use super::metrics::ValidationMetrics;
use super::ohlcv::{Bar, is_chronological};
use super::params::ValidationSettings;
use super::pattern::{PatternCandidate, PatternKind, detect};
use super::simulator::{SimulatedTrade, simulate};
use super::verdict::ValidationVerdict;
use crate::ports::cache_port::VerdictStore;
use crate::ports::clock_port::Clock;
use crate::ports::data_port::DataPort;

/// A verdict together with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationAudit {
    pub verdict: ValidationVerdict,
    pub candidates: Vec<PatternCandidate>,
    pub trades: Vec<SimulatedTrade>,
}

pub struct StrategyValidator {
    data: Arc<dyn DataPort>,
    cache: ValidationCache,
    settings: ValidationSettings,
    fingerprints: HashMap<PatternKind, String>,
}

impl StrategyValidator {
    pub fn new(
        data: Arc<dyn DataPort>,
        store: Arc<dyn VerdictStore>,
        clock: Arc<dyn Clock>,
        settings: ValidationSettings,
    ) -> Result<Self, StratgateError> {
        let fingerprints = PatternKind::ALL
            .into_iter()
            .map(|kind| Ok((kind, settings.fingerprint(kind)?)))
            .collect::<Result<HashMap<_, _>, StratgateError>>()?;
        let cache = ValidationCache::new(store, clock, Duration::days(settings.cache_ttl_days));
        Ok(StrategyValidator {
            data,
            cache,
            settings,
            fingerprints,
        })
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ValidationCache {
        &self.cache
    }

    pub fn data(&self) -> &dyn DataPort {
        self.data.as_ref()
    }

    pub fn cache_key(&self, symbol: &str, kind: PatternKind) -> CacheKey {
        let fingerprint = self.fingerprints.get(&kind).map(String::as_str).unwrap_or_default();
        CacheKey::new(symbol, kind, fingerprint)
    }

    /// Cached verdict if fresh, otherwise a newly computed (and cached) one.
    /// Never fails: data problems become rejected verdicts.
    pub fn validate(&self, symbol: &str, kind: PatternKind) -> ValidationVerdict {
        let key = self.cache_key(symbol, kind);
        if let Some(verdict) = self.cache.get(&key) {
            debug!(%key, "verdict cache hit");
            return verdict;
        }

        let lock = self.cache.key_lock(&key);
        let verdict = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cache.get(&key) {
                Some(verdict) => {
                    debug!(%key, "verdict computed by another caller");
                    verdict
                }
                None => {
                    let audit = self.run(symbol, kind, &key);
                    self.cache.put(&key, audit.verdict)
                }
            }
        };
        self.cache.release_key_lock(&key, lock);
        verdict
    }

    /// Recompute regardless of the cache, refresh the cached entry and
    /// return the candidates and trades behind the verdict.
    pub fn audit(&self, symbol: &str, kind: PatternKind) -> ValidationAudit {
        let key = self.cache_key(symbol, kind);
        let lock = self.cache.key_lock(&key);
        let audit = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let mut audit = self.run(symbol, kind, &key);
            audit.verdict = self.cache.put(&key, audit.verdict);
            audit
        };
        self.cache.release_key_lock(&key, lock);
        audit
    }

    /// Candidates over the configured history without simulating them.
    pub fn scan(&self, symbol: &str, kind: PatternKind) -> Result<Vec<PatternCandidate>, StratgateError> {
        let bars = self.load_bars(symbol)?;
        Ok(detect(&bars, kind, &self.settings.detector).collect())
    }

    fn history_window(&self) -> (NaiveDate, NaiveDate) {
        let end = self.cache.now().date_naive();
        let start = end
            .checked_sub_months(Months::new(12 * self.settings.history_years))
            .unwrap_or(NaiveDate::MIN);
        (start, end)
    }

    fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, StratgateError> {
        let (start, end) = self.history_window();
        let mut bars = self.data.fetch_bars(symbol, start, end)?;
        if !is_chronological(&bars) {
            warn!(symbol, "bars out of order or duplicated, sorting");
            bars.sort_by_key(|b| b.date);
            bars.dedup_by_key(|b| b.date);
        }
        Ok(bars)
    }

    fn run(&self, symbol: &str, kind: PatternKind, key: &CacheKey) -> ValidationAudit {
        let now = self.cache.now();
        let fingerprint = key.fingerprint.as_str();
        let minimum = self.settings.detector.min_lookback(kind);

        let bars = match self.load_bars(symbol) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, strategy = %kind, error = %e, "price data unavailable");
                return ValidationAudit {
                    verdict: ValidationVerdict::insufficient_data(
                        symbol,
                        kind,
                        fingerprint,
                        format!("insufficient data: {e}"),
                        0,
                        now,
                    ),
                    candidates: Vec::new(),
                    trades: Vec::new(),
                };
            }
        };

        if bars.len() < minimum {
            let e = StratgateError::InsufficientData {
                symbol: symbol.to_string(),
                bars: bars.len(),
                minimum,
            };
            info!(symbol, strategy = %kind, bars = bars.len(), minimum, "too little history to validate");
            return ValidationAudit {
                verdict: ValidationVerdict::insufficient_data(
                    symbol,
                    kind,
                    fingerprint,
                    e.to_string(),
                    bars.len(),
                    now,
                ),
                candidates: Vec::new(),
                trades: Vec::new(),
            };
        }

        let candidates: Vec<PatternCandidate> = detect(&bars, kind, &self.settings.detector).collect();
        let trades = simulate(symbol, &bars, candidates.iter().cloned(), &self.settings.simulation);
        let metrics = ValidationMetrics::compute(&trades, self.settings.acceptance.min_closed_trades);
        let verdict = ValidationVerdict::from_metrics(
            symbol,
            kind,
            fingerprint,
            metrics,
            &self.settings.acceptance,
            bars.len(),
            now,
        );

        info!(
            symbol,
            strategy = %kind,
            validated = verdict.validated,
            candidates = candidates.len(),
            closed_trades = verdict.metrics.closed_trades,
            win_rate = verdict.metrics.win_rate,
            profit_factor = verdict.metrics.profit_factor,
            "validation finished"
        );

        ValidationAudit {
            verdict,
            candidates,
            trades,
        }
    }
}
