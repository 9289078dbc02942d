//! Indicator history and latest-value projection.

use crate::services::database::{from_millis, to_millis, Database, StoreError};
use crate::types::{
    HistoryPoint, LatestIndicator, LatestIndicators, NewObservation, RecordedObservation,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::debug;

/// Rows deleted per statement during a purge.
pub const PURGE_BATCH_SIZE: usize = 5_000;

/// Append-only indicator history with a per-(symbol, name) latest projection.
pub struct IndicatorStore {
    db: Arc<Database>,
}

impl IndicatorStore {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Append an observation and advance the latest projection.
    ///
    /// Both writes share one transaction. The projection only moves forward:
    /// an observation older than the stored one lands in history but leaves
    /// the projection untouched.
    pub fn record(&self, obs: &NewObservation) -> Result<RecordedObservation, StoreError> {
        let observed_at = to_millis(obs.observed_at);

        let recorded = self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO indicator_history
                 (symbol, indicator_name, value, value2, value3, timeframe, source, observed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    obs.symbol,
                    obs.name,
                    obs.value,
                    obs.value2,
                    obs.value3,
                    obs.timeframe,
                    obs.source,
                    observed_at,
                ],
            )?;
            let id = tx.last_insert_rowid();

            let projected = tx.execute(
                "INSERT INTO latest_indicators
                 (symbol, indicator_name, value, value2, value3, timeframe, observation_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(symbol, indicator_name) DO UPDATE SET
                    value = excluded.value,
                    value2 = excluded.value2,
                    value3 = excluded.value3,
                    timeframe = excluded.timeframe,
                    observation_id = excluded.observation_id,
                    updated_at = excluded.updated_at
                 WHERE excluded.updated_at >= latest_indicators.updated_at",
                params![
                    obs.symbol,
                    obs.name,
                    obs.value,
                    obs.value2,
                    obs.value3,
                    obs.timeframe,
                    id,
                    observed_at,
                ],
            )? > 0;

            Ok(RecordedObservation { id, projected })
        })?;

        if !recorded.projected {
            debug!(
                "Observation {} for {}/{} is older than the projection; history only",
                recorded.id, obs.symbol, obs.name
            );
        }

        Ok(recorded)
    }

    /// All latest indicator values for a symbol.
    pub fn latest(&self, symbol: &str) -> Result<LatestIndicators, StoreError> {
        self.db.with_conn(|conn| load_latest(conn, symbol))
    }

    /// Latest value of a single indicator.
    pub fn latest_value(
        &self,
        symbol: &str,
        name: &str,
    ) -> Result<Option<LatestIndicator>, StoreError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT value, value2, value3, timeframe, updated_at
                     FROM latest_indicators
                     WHERE symbol = ?1 AND indicator_name = ?2",
                    params![symbol, name],
                    |row| {
                        Ok(LatestIndicator {
                            value: row.get(0)?,
                            value2: row.get(1)?,
                            value3: row.get(2)?,
                            timeframe: row.get(3)?,
                            updated_at: from_millis(row.get(4)?),
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// History of one indicator newer than `now - since`, oldest first.
    pub fn history(
        &self,
        symbol: &str,
        name: &str,
        since: Duration,
    ) -> Result<Vec<HistoryPoint>, StoreError> {
        let cutoff = to_millis(Utc::now() - since);

        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT value, value2, value3, observed_at
                 FROM indicator_history
                 WHERE symbol = ?1 AND indicator_name = ?2 AND observed_at > ?3
                 ORDER BY observed_at ASC, id ASC",
            )?;

            let points = stmt
                .query_map(params![symbol, name, cutoff], |row| {
                    Ok(HistoryPoint {
                        value: row.get(0)?,
                        value2: row.get(1)?,
                        value3: row.get(2)?,
                        observed_at: from_millis(row.get(3)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(points)
        })
    }

    /// Symbols with at least one latest value.
    pub fn symbols(&self) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT symbol FROM latest_indicators ORDER BY symbol")?;
            let symbols = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(symbols)
        })
    }

    /// Delete history rows observed before `cutoff`.
    ///
    /// Runs in batches; each batch commits on its own so an interrupted purge
    /// can simply be run again.
    pub fn purge_history(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = to_millis(cutoff);
        let mut total = 0;

        loop {
            let deleted = self.db.with_conn(|conn| {
                Ok(conn.execute(
                    "DELETE FROM indicator_history WHERE id IN (
                        SELECT id FROM indicator_history WHERE observed_at < ?1 LIMIT ?2
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

/// Load the latest projection for a symbol on an existing connection.
pub(crate) fn load_latest(conn: &Connection, symbol: &str) -> Result<LatestIndicators, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT indicator_name, value, value2, value3, timeframe, updated_at
         FROM latest_indicators
         WHERE symbol = ?1",
    )?;

    let rows = stmt
        .query_map(params![symbol], |row| {
            Ok((
                row.get::<_, String>(0)?,
                LatestIndicator {
                    value: row.get(1)?,
                    value2: row.get(2)?,
                    value3: row.get(3)?,
                    timeframe: row.get(4)?,
                    updated_at: from_millis(row.get(5)?),
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut latest = LatestIndicators::empty(symbol);
    for (name, indicator) in rows {
        if latest.last_updated.map_or(true, |t| indicator.updated_at > t) {
            latest.last_updated = Some(indicator.updated_at);
        }
        latest.indicators.insert(name, indicator);
    }

    Ok(latest)
}
