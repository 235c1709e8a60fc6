//! SQLite storage for price history and cached verdicts.

use crate::domain::cache::CacheKey;
use crate::domain::error::StratgateError;
use crate::domain::ohlcv::Bar;
use crate::domain::verdict::ValidationVerdict;
use crate::ports::cache_port::VerdictStore;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};
use std::time::Duration;

fn cache_error(e: impl std::fmt::Display) -> StratgateError {
    StratgateError::CacheUnavailable {
        reason: e.to_string(),
    }
}

fn data_error(symbol: &str, e: impl std::fmt::Display) -> StratgateError {
    StratgateError::DataUnavailable {
        symbol: symbol.to_string(),
        reason: e.to_string(),
    }
}

/// Fixed-width UTC timestamps so text comparison orders correctly.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StratgateError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| StratgateError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        let connect_timeout = config.get_int("sqlite", "connect_timeout_secs", 5).max(1) as u64;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(Duration::from_secs(connect_timeout))
            .build(manager)
            .map_err(cache_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, StratgateError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(cache_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, r2d2::Error> {
        self.pool.get()
    }

    pub fn initialize_schema(&self) -> Result<(), StratgateError> {
        let conn = self.conn().map_err(cache_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                PRIMARY KEY (symbol, date)
            );
            CREATE TABLE IF NOT EXISTS verdicts (
                symbol TEXT NOT NULL,
                strategy TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                evaluated_at TEXT NOT NULL,
                payload TEXT NOT NULL,
                PRIMARY KEY (symbol, strategy, fingerprint)
            );
            CREATE INDEX IF NOT EXISTS idx_verdicts_evaluated_at ON verdicts(evaluated_at);",
        )
        .map_err(cache_error)?;
        Ok(())
    }

    pub fn insert_bars(&self, bars: &[Bar]) -> Result<(), StratgateError> {
        let symbol = bars.first().map(|b| b.symbol.as_str()).unwrap_or("*");
        let mut conn = self.conn().map_err(|e| data_error(symbol, e))?;
        let tx = conn.transaction().map_err(|e| data_error(symbol, e))?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(|e| data_error(&bar.symbol, e))?;
        }

        tx.commit().map_err(|e| data_error(symbol, e))?;
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, StratgateError> {
        let conn = self.conn().map_err(|e| data_error(symbol, e))?;

        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, volume
                 FROM ohlcv
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(|e| data_error(symbol, e))?;

        let start_str = start_date.format("%Y-%m-%d").to_string();
        let end_str = end_date.format("%Y-%m-%d").to_string();
        let rows = stmt
            .query_map(params![symbol, start_str, end_str], |row| {
                let date_str: String = row.get(1)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Bar {
                    symbol: row.get(0)?,
                    date,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(|e| data_error(symbol, e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| data_error(symbol, e))
    }

    fn list_symbols(&self) -> Result<Vec<String>, StratgateError> {
        let conn = self.conn().map_err(|e| data_error("*", e))?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol")
            .map_err(|e| data_error("*", e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| data_error("*", e))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| data_error("*", e))
    }
}

impl VerdictStore for SqliteAdapter {
    fn load(&self, key: &CacheKey) -> Result<Option<ValidationVerdict>, StratgateError> {
        let conn = self.conn().map_err(cache_error)?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM verdicts
                 WHERE symbol = ?1 AND strategy = ?2 AND fingerprint = ?3",
                params![key.symbol, key.strategy.as_str(), key.fingerprint],
                |row| row.get(0),
            )
            .optional()
            .map_err(cache_error)?;

        payload
            .map(|json| serde_json::from_str(&json).map_err(cache_error))
            .transpose()
    }

    fn save(&self, key: &CacheKey, verdict: &ValidationVerdict) -> Result<(), StratgateError> {
        let payload = serde_json::to_string(verdict)?;
        let conn = self.conn().map_err(cache_error)?;
        conn.execute(
            "INSERT OR REPLACE INTO verdicts (symbol, strategy, fingerprint, evaluated_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.symbol,
                key.strategy.as_str(),
                key.fingerprint,
                timestamp(verdict.evaluated_at),
                payload
            ],
        )
        .map_err(cache_error)?;
        Ok(())
    }

    fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StratgateError> {
        let conn = self.conn().map_err(cache_error)?;
        conn.execute(
            "DELETE FROM verdicts WHERE evaluated_at < ?1",
            params![timestamp(cutoff)],
        )
        .map_err(cache_error)
    }
}
