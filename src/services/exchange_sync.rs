//! Exchange account sync into the position store.

use crate::services::database::StoreError;
use crate::services::position_store::PositionStore;
use crate::sources::binance::{self, BinanceAccountClient};
use crate::types::{NewPosition, PortfolioValue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

/// Connection state of one exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    pub connected: bool,
    #[serde(rename = "type")]
    pub exchange_type: String,
}

/// Outcome of syncing one exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub exchange: String,
    pub balances: usize,
    pub positions: usize,
    pub errors: Vec<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Owns exchange connectors and writes their data to the position store.
pub struct ExchangeManager {
    binance: Option<BinanceAccountClient>,
    positions: Arc<PositionStore>,
}

impl ExchangeManager {
    pub fn new(binance: Option<BinanceAccountClient>, positions: Arc<PositionStore>) -> Arc<Self> {
        Arc::new(Self { binance, positions })
    }

    /// Connection status per exchange.
    pub fn status(&self) -> BTreeMap<String, ExchangeStatus> {
        let mut status = BTreeMap::new();
        status.insert(
            binance::EXCHANGE.to_string(),
            ExchangeStatus {
                connected: self.binance.is_some(),
                exchange_type: "spot+futures".to_string(),
            },
        );
        status
    }

    /// Sync every connected exchange.
    pub async fn sync_all(&self) -> Vec<SyncReport> {
        let mut reports = Vec::new();
        if let Some(client) = &self.binance {
            reports.push(self.sync_binance(client).await);
        }
        reports
    }

    async fn sync_binance(&self, client: &BinanceAccountClient) -> SyncReport {
        let mut report = SyncReport {
            exchange: binance::EXCHANGE.to_string(),
            ..Default::default()
        };

        match client.fetch_balances().await {
            Ok(balances) => {
                for balance in &balances {
                    if let Err(e) = self.positions.upsert_balance(balance) {
                        report.errors.push(e.to_string());
                    } else {
                        report.balances += 1;
                    }
                }
            }
            Err(e) => {
                error!("Binance balance sync failed: {}", e);
                report.errors.push(e.to_string());
            }
        }

        match client.fetch_positions().await {
            Ok(positions) => match self.replace_positions(binance::EXCHANGE, &positions) {
                Ok(count) => report.positions = count,
                Err(e) => report.errors.push(e.to_string()),
            },
            Err(e) => {
                error!("Binance position sync failed: {}", e);
                report.errors.push(e.to_string());
            }
        }

        report.synced_at = Some(Utc::now());
        info!(
            "Synced {}: {} balances, {} positions, {} errors",
            report.exchange,
            report.balances,
            report.positions,
            report.errors.len()
        );
        report
    }

    /// Replace an exchange's positions with a freshly fetched set.
    pub fn replace_positions(
        &self,
        exchange: &str,
        positions: &[NewPosition],
    ) -> Result<usize, StoreError> {
        self.positions.replace_positions(exchange, positions)
    }

    /// Portfolio value across all exchanges.
    pub fn total_value(&self) -> Result<PortfolioValue, StoreError> {
        let balances = self.positions.get_balances(None)?;
        let positions = self.positions.get_positions(None)?;
        Ok(PortfolioValue::from_holdings(&balances, &positions))
    }
}
