//! Daily price history access.

use crate::domain::error::StratgateError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

/// Shared across worker threads, so implementations must be `Send + Sync`.
pub trait DataPort: Send + Sync {
    /// Bars for `symbol` with `start_date <= date <= end_date`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, StratgateError>;

    fn list_symbols(&self) -> Result<Vec<String>, StratgateError>;
}
