//! Time-bounded verdict cache over a [`VerdictStore`].
//!
//! Lookups never fail: a broken backend is logged and treated as a miss, so
//! validation degrades to recomputation rather than erroring out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::StratgateError;
use super::pattern::PatternKind;
use super::verdict::ValidationVerdict;
use crate::ports::cache_port::VerdictStore;
use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub symbol: String,
    pub strategy: PatternKind,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(symbol: &str, strategy: PatternKind, fingerprint: &str) -> Self {
        CacheKey {
            symbol: symbol.to_string(),
            strategy,
            fingerprint: fingerprint.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..12).unwrap_or(&self.fingerprint);
        write!(f, "{}/{}/{}", self.symbol, self.strategy, short)
    }
}

pub struct ValidationCache {
    store: Arc<dyn VerdictStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl ValidationCache {
    pub fn new(store: Arc<dyn VerdictStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        ValidationCache {
            store,
            clock,
            ttl,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// A fresh verdict for `key`, or `None` on miss, expiry or backend failure.
    pub fn get(&self, key: &CacheKey) -> Option<ValidationVerdict> {
        match self.store.load(key) {
            Ok(Some(verdict)) if verdict.is_fresh(self.now(), self.ttl) => Some(verdict),
            Ok(Some(_)) => {
                debug!(%key, "cached verdict expired");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(%key, error = %e, "verdict cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stamp `verdict` with the current time and store it. Returns the
    /// stamped verdict whether or not the write succeeded.
    pub fn put(&self, key: &CacheKey, mut verdict: ValidationVerdict) -> ValidationVerdict {
        verdict.evaluated_at = self.now();
        if let Err(e) = self.store.save(key, &verdict) {
            warn!(%key, error = %e, "verdict cache write failed");
        }
        verdict
    }

    /// Remove every entry past its TTL.
    pub fn purge_stale(&self) -> Result<usize, StratgateError> {
        let cutoff = self.now() - self.ttl;
        let purged = self.store.purge_before(cutoff)?;
        debug!(purged, %cutoff, "purged stale verdicts");
        Ok(purged)
    }

    /// Mutex serializing computation for one key. Callers hold it across
    /// "check, compute, put" so concurrent misses compute once.
    pub fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Hand back a lock taken with [`key_lock`](Self::key_lock). The entry
    /// is dropped once no other caller holds it.
    pub fn release_key_lock(&self, key: &CacheKey, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(key).is_some_and(|held| Arc::strong_count(held) == 1) {
            locks.remove(key);
        }
    }
}
