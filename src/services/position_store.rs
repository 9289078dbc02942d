//! Exchange positions and balances written by account connectors.

use crate::services::database::{conversion_error, from_millis, to_millis, Database, StoreError};
use crate::types::{Balance, NewBalance, NewPosition, Position};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::Arc;

/// Positions and balances per exchange.
pub struct PositionStore {
    db: Arc<Database>,
}

impl PositionStore {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Insert or update a position keyed by (exchange, symbol, side).
    pub fn upsert_position(&self, position: &NewPosition) -> Result<(), StoreError> {
        let now = to_millis(Utc::now());
        self.db.with_conn(|conn| write_position(conn, position, now))
    }

    /// Open positions, newest first, optionally for one exchange.
    pub fn get_positions(&self, exchange: Option<&str>) -> Result<Vec<Position>, StoreError> {
        self.db.with_conn(|conn| load_positions(conn, exchange))
    }

    /// Swap an exchange's positions for a fresh set in one transaction.
    ///
    /// Readers see either the old set or the new one. If any row fails to
    /// write, the old set is kept.
    pub fn replace_positions(
        &self,
        exchange: &str,
        positions: &[NewPosition],
    ) -> Result<usize, StoreError> {
        let now = to_millis(Utc::now());
        self.db.with_tx(|tx| {
            tx.execute(
                "DELETE FROM exchange_positions WHERE exchange = ?1",
                params![exchange],
            )?;
            for position in positions {
                write_position(tx, position, now)?;
            }
            Ok(positions.len())
        })
    }

    /// Insert or update a balance keyed by (exchange, asset).
    pub fn upsert_balance(&self, balance: &NewBalance) -> Result<(), StoreError> {
        let now = to_millis(Utc::now());
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO exchange_balances
                 (exchange, asset, free, locked, total, usd_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(exchange, asset) DO UPDATE SET
                    free = excluded.free,
                    locked = excluded.locked,
                    total = excluded.total,
                    usd_value = excluded.usd_value,
                    updated_at = excluded.updated_at",
                params![
                    balance.exchange,
                    balance.asset,
                    balance.free,
                    balance.locked,
                    balance.free + balance.locked,
                    balance.usd_value,
                    now,
                ],
            )?;
            Ok(())
        })
    }

    /// Non-zero balances by USD value, optionally for one exchange.
    pub fn get_balances(&self, exchange: Option<&str>) -> Result<Vec<Balance>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT exchange, asset, free, locked, total, usd_value, updated_at
                 FROM exchange_balances
                 WHERE total > 0 AND (?1 IS NULL OR exchange = ?1)
                 ORDER BY usd_value IS NULL, usd_value DESC, asset",
            )?;

            let balances = stmt
                .query_map(params![exchange], |row| {
                    Ok(Balance {
                        exchange: row.get(0)?,
                        asset: row.get(1)?,
                        free: row.get(2)?,
                        locked: row.get(3)?,
                        total: row.get(4)?,
                        usd_value: row.get(5)?,
                        updated_at: from_millis(row.get(6)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(balances)
        })
    }
}

fn write_position(conn: &Connection, position: &NewPosition, now: i64) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO exchange_positions
         (exchange, symbol, side, quantity, entry_price, current_price, notional_value,
          unrealized_pnl, leverage, margin_mode, stop_loss, take_profit, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(exchange, symbol, side) DO UPDATE SET
            quantity = excluded.quantity,
            entry_price = excluded.entry_price,
            current_price = excluded.current_price,
            notional_value = excluded.notional_value,
            unrealized_pnl = excluded.unrealized_pnl,
            leverage = excluded.leverage,
            margin_mode = excluded.margin_mode,
            stop_loss = excluded.stop_loss,
            take_profit = excluded.take_profit,
            updated_at = excluded.updated_at",
        params![
            position.exchange,
            position.symbol,
            position.side.as_str(),
            position.quantity,
            position.entry_price,
            position.current_price,
            position.notional_value(),
            position.unrealized_pnl,
            position.leverage,
            position.margin_mode,
            position.stop_loss,
            position.take_profit,
            now,
        ],
    )?;
    Ok(())
}

/// Load open positions on an existing connection.
pub(crate) fn load_positions(
    conn: &Connection,
    exchange: Option<&str>,
) -> Result<Vec<Position>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT exchange, symbol, side, quantity, entry_price, current_price, notional_value,
                unrealized_pnl, leverage, margin_mode, stop_loss, take_profit, updated_at
         FROM exchange_positions
         WHERE quantity != 0 AND (?1 IS NULL OR exchange = ?1)
         ORDER BY updated_at DESC, id DESC",
    )?;

    let positions = stmt
        .query_map(params![exchange], position_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(positions)
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Position> {
    let side: String = row.get(2)?;
    Ok(Position {
        exchange: row.get(0)?,
        symbol: row.get(1)?,
        side: side.parse().map_err(|e| conversion_error(2, e))?,
        quantity: row.get(3)?,
        entry_price: row.get(4)?,
        current_price: row.get(5)?,
        notional_value: row.get(6)?,
        unrealized_pnl: row.get(7)?,
        leverage: row.get(8)?,
        margin_mode: row.get(9)?,
        stop_loss: row.get(10)?,
        take_profit: row.get(11)?,
        updated_at: from_millis(row.get(12)?),
    })
}
