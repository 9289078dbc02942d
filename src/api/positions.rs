//! Position, balance and exchange endpoints.

use crate::error::Result;
use crate::services::ExchangeStatus;
use crate::types::{Balance, Position};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct ExchangeQuery {
    pub exchange: Option<String>,
}

impl ExchangeQuery {
    fn exchange(&self) -> Option<String> {
        self.exchange
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub positions: Vec<Position>,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub balances: Vec<Balance>,
}

#[derive(Debug, Serialize)]
pub struct SyncStartedResponse {
    pub status: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/positions", get(get_positions))
        .route("/api/balances", get(get_balances))
        .route("/api/exchanges/status", get(get_exchange_status))
        .route("/api/exchanges/sync", post(sync_exchanges))
}

async fn get_positions(
    State(state): State<AppState>,
    Query(query): Query<ExchangeQuery>,
) -> Result<Json<PositionsResponse>> {
    let positions = state.positions.get_positions(query.exchange().as_deref())?;
    Ok(Json(PositionsResponse { positions }))
}

async fn get_balances(
    State(state): State<AppState>,
    Query(query): Query<ExchangeQuery>,
) -> Result<Json<BalancesResponse>> {
    let balances = state.positions.get_balances(query.exchange().as_deref())?;
    Ok(Json(BalancesResponse { balances }))
}

async fn get_exchange_status(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, ExchangeStatus>> {
    Json(state.exchanges.status())
}

/// Start an exchange sync in the background and return immediately.
async fn sync_exchanges(
    State(state): State<AppState>,
) -> (StatusCode, Json<SyncStartedResponse>) {
    let exchanges = state.exchanges.clone();
    tokio::spawn(async move {
        for report in exchanges.sync_all().await {
            if report.errors.is_empty() {
                info!(
                    "Exchange sync complete for {}: {} balances, {} positions",
                    report.exchange, report.balances, report.positions
                );
            } else {
                error!(
                    "Exchange sync for {} finished with errors: {:?}",
                    report.exchange, report.errors
                );
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(SyncStartedResponse {
            status: "sync_started",
        }),
    )
}
