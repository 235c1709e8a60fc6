//! Persistent storage for validation verdicts.

use chrono::{DateTime, Utc};

use crate::domain::cache::CacheKey;
use crate::domain::error::StratgateError;
use crate::domain::verdict::ValidationVerdict;

/// Backend failures surface as [`StratgateError::CacheUnavailable`]. The
/// store knows nothing about freshness; expiry is decided by the caller.
pub trait VerdictStore: Send + Sync {
    fn load(&self, key: &CacheKey) -> Result<Option<ValidationVerdict>, StratgateError>;

    /// Insert or replace.
    fn save(&self, key: &CacheKey, verdict: &ValidationVerdict) -> Result<(), StratgateError>;

    /// Drop entries evaluated before `cutoff`, returning how many went.
    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StratgateError>;
}
