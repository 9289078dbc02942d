//! Durable log of detected signals.

use crate::services::database::{conversion_error, from_millis, to_millis, Database, StoreError};
use crate::services::indicator_store::PURGE_BATCH_SIZE;
use crate::types::{NewSignal, SignalEvent, SignalFilter};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

const SELECT_COLUMNS: &str = "SELECT id, symbol, signal_type, direction, strength, price_at_signal,
        indicator_snapshot, message, created_at, acknowledged, acknowledged_at
     FROM trading_signals";

/// Append log of signal events.
pub struct SignalLog {
    db: Arc<Database>,
}

impl SignalLog {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Append one signal, returning its id.
    pub fn append(&self, signal: &NewSignal) -> Result<i64, StoreError> {
        self.db.with_tx(|tx| insert_signal(tx, signal))
    }

    /// Append several signals atomically, returning the persisted events.
    pub fn append_all(&self, signals: Vec<NewSignal>) -> Result<Vec<SignalEvent>, StoreError> {
        if signals.is_empty() {
            return Ok(Vec::new());
        }

        self.db.with_tx(|tx| {
            let mut events = Vec::with_capacity(signals.len());
            for signal in signals {
                let id = insert_signal(tx, &signal)?;
                events.push(signal.into_event(id));
            }
            Ok(events)
        })
    }

    /// Signals matching the filter, newest first.
    pub fn query(&self, filter: &SignalFilter) -> Result<Vec<SignalEvent>, StoreError> {
        self.db.with_conn(|conn| query_signals(conn, filter))
    }

    /// Get a single signal by id.
    pub fn get(&self, id: i64) -> Result<Option<SignalEvent>, StoreError> {
        self.db.with_conn(|conn| {
            let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
            let event = conn
                .query_row(&sql, params![id], signal_from_row)
                .optional()?;
            Ok(event)
        })
    }

    /// Mark a signal acknowledged. Returns false when no such signal exists.
    ///
    /// Acknowledging twice is harmless; the first acknowledgment time is kept.
    pub fn acknowledge(&self, id: i64) -> Result<bool, StoreError> {
        let now = to_millis(Utc::now());
        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE trading_signals
                 SET acknowledged = 1, acknowledged_at = COALESCE(acknowledged_at, ?2)
                 WHERE id = ?1",
                params![id, now],
            )?;
            Ok(updated > 0)
        })
    }

    /// Delete acknowledged signals created before `cutoff`.
    ///
    /// Unacknowledged signals are never deleted, whatever their age.
    pub fn purge_acknowledged(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = to_millis(cutoff);
        let mut total = 0;

        loop {
            let deleted = self.db.with_conn(|conn| {
                Ok(conn.execute(
                    "DELETE FROM trading_signals WHERE id IN (
                        SELECT id FROM trading_signals
                        WHERE acknowledged = 1 AND created_at < ?1
                        LIMIT ?2
                     )",
                    params![cutoff, PURGE_BATCH_SIZE as i64],
                )?)
            })?;

            total += deleted;
            if deleted < PURGE_BATCH_SIZE {
                break;
            }
        }

        Ok(total)
    }
}

fn insert_signal(tx: &Transaction<'_>, signal: &NewSignal) -> Result<i64, StoreError> {
    let snapshot = serde_json::to_string(&signal.indicator_snapshot)?;
    tx.execute(
        "INSERT INTO trading_signals
         (symbol, signal_type, direction, strength, price_at_signal,
          indicator_snapshot, message, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            signal.symbol,
            signal.signal_type.as_str(),
            signal.direction.as_str(),
            signal.strength.as_str(),
            signal.price_at_signal,
            snapshot,
            signal.message,
            to_millis(signal.created_at),
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Query signals on an existing connection.
pub(crate) fn query_signals(
    conn: &Connection,
    filter: &SignalFilter,
) -> Result<Vec<SignalEvent>, StoreError> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR symbol = ?1) AND (?2 IS NULL OR acknowledged = ?2)
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
        SELECT_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(
            params![filter.symbol, filter.acknowledged, filter.limit as i64],
            signal_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<SignalEvent> {
    let signal_type: String = row.get(2)?;
    let direction: String = row.get(3)?;
    let strength: String = row.get(4)?;
    let snapshot: String = row.get(6)?;
    let indicator_snapshot: BTreeMap<String, f64> =
        serde_json::from_str(&snapshot).map_err(|e| conversion_error(6, e))?;

    Ok(SignalEvent {
        id: row.get(0)?,
        symbol: row.get(1)?,
        signal_type: signal_type.parse().map_err(|e| conversion_error(2, e))?,
        direction: direction.parse().map_err(|e| conversion_error(3, e))?,
        strength: strength.parse().map_err(|e| conversion_error(4, e))?,
        price_at_signal: row.get(5)?,
        indicator_snapshot,
        message: row.get(7)?,
        created_at: from_millis(row.get(8)?),
        acknowledged: row.get(9)?,
        acknowledged_at: row.get::<_, Option<i64>>(10)?.map(from_millis),
    })
}
