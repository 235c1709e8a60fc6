//! Process-local verdict store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::domain::cache::CacheKey;
use crate::domain::error::StratgateError;
use crate::domain::verdict::ValidationVerdict;
use crate::ports::cache_port::VerdictStore;

#[derive(Default)]
pub struct MemoryVerdictStore {
    entries: RwLock<HashMap<CacheKey, ValidationVerdict>>,
}

impl MemoryVerdictStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VerdictStore for MemoryVerdictStore {
    fn load(&self, key: &CacheKey) -> Result<Option<ValidationVerdict>, StratgateError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &CacheKey, verdict: &ValidationVerdict) -> Result<(), StratgateError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.clone(), verdict.clone());
        Ok(())
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StratgateError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, v| v.evaluated_at >= cutoff);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::ValidationMetrics;
    use crate::domain::pattern::PatternKind;
    use chrono::{Duration, TimeZone};

    fn verdict(at: DateTime<Utc>) -> ValidationVerdict {
        ValidationVerdict {
            symbol: "AAPL".into(),
            strategy: PatternKind::GoldenCross,
            fingerprint: "fp".into(),
            validated: true,
            metrics: ValidationMetrics::empty(),
            rejection: None,
            bars_evaluated: 300,
            evaluated_at: at,
        }
    }

    #[test]
    fn save_load_purge() {
        let store = MemoryVerdictStore::new();
        let at = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let key = CacheKey::new("AAPL", PatternKind::GoldenCross, "fp");

        assert!(store.is_empty());
        store.save(&key, &verdict(at)).unwrap();
        assert_eq!(store.load(&key).unwrap(), Some(verdict(at)));
        assert_eq!(store.len(), 1);

        assert_eq!(store.purge_before(at).unwrap(), 0);
        assert_eq!(store.purge_before(at + Duration::seconds(1)).unwrap(), 1);
        assert!(store.is_empty());
    }
}
