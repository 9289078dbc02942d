//! SQLite persistence layer.
//!
//! One connection behind a mutex serves every store:
//! - Indicator history and the latest-value projection
//! - Signal log
//! - Exchange positions and balances
//! - Market assessments
//!
//! Multi-statement writes go through [`Database::with_tx`] so readers never
//! observe half of a logical write.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Retention window out of range: {0} days")]
    RetentionWindow(i64),
}

/// Tables created by the schema, used for stats.
pub const TABLES: &[&str] = &[
    "indicator_history",
    "latest_indicators",
    "trading_signals",
    "exchange_positions",
    "exchange_balances",
    "market_assessments",
];

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS indicator_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        indicator_name TEXT NOT NULL,
        value REAL,
        value2 REAL,
        value3 REAL,
        timeframe TEXT NOT NULL,
        source TEXT NOT NULL,
        observed_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_history_key_time
        ON indicator_history(symbol, indicator_name, observed_at);
    CREATE INDEX IF NOT EXISTS idx_history_time
        ON indicator_history(observed_at);

    CREATE TABLE IF NOT EXISTS latest_indicators (
        symbol TEXT NOT NULL,
        indicator_name TEXT NOT NULL,
        value REAL,
        value2 REAL,
        value3 REAL,
        timeframe TEXT NOT NULL,
        observation_id INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (symbol, indicator_name)
    );

    CREATE TABLE IF NOT EXISTS trading_signals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        signal_type TEXT NOT NULL,
        direction TEXT NOT NULL,
        strength TEXT NOT NULL,
        price_at_signal REAL,
        indicator_snapshot TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        acknowledged INTEGER NOT NULL DEFAULT 0,
        acknowledged_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_signals_symbol_time
        ON trading_signals(symbol, created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_signals_ack_time
        ON trading_signals(acknowledged, created_at);

    CREATE TABLE IF NOT EXISTS exchange_positions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exchange TEXT NOT NULL,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        quantity REAL NOT NULL,
        entry_price REAL,
        current_price REAL,
        notional_value REAL,
        unrealized_pnl REAL,
        leverage REAL NOT NULL DEFAULT 1.0,
        margin_mode TEXT,
        stop_loss REAL,
        take_profit REAL,
        updated_at INTEGER NOT NULL,
        UNIQUE(exchange, symbol, side)
    );

    CREATE TABLE IF NOT EXISTS exchange_balances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        exchange TEXT NOT NULL,
        asset TEXT NOT NULL,
        free REAL NOT NULL,
        locked REAL NOT NULL DEFAULT 0,
        total REAL NOT NULL,
        usd_value REAL,
        updated_at INTEGER NOT NULL,
        UNIQUE(exchange, asset)
    );

    CREATE TABLE IF NOT EXISTS market_assessments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        bias TEXT NOT NULL,
        confidence REAL NOT NULL,
        sentiment TEXT,
        market_data TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_assessments_symbol_time
        ON market_assessments(symbol, created_at DESC);
";

/// Shared SQLite handle.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        info!("SQLite database initialized");
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;
        debug!("In-memory SQLite database initialized");
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction, committing only when it succeeds.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Row counts per table.
    pub fn table_counts(&self) -> Result<Vec<(String, u64)>, StoreError> {
        self.with_conn(|conn| {
            TABLES
                .iter()
                .map(|table| {
                    let count: i64 = conn.query_row(
                        &format!("SELECT COUNT(*) FROM {}", table),
                        [],
                        |row| row.get(0),
                    )?;
                    Ok::<_, StoreError>((table.to_string(), count.max(0) as u64))
                })
                .collect()
        })
    }
}

/// Convert a timestamp to stored milliseconds.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert stored milliseconds back to a timestamp.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Wrap a label parse failure as a column conversion error.
pub(crate) fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}
