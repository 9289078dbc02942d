//! Signal log endpoints.

use crate::api::bounded;
use crate::error::{AppError, Result};
use crate::types::{SignalEvent, SignalFilter};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

/// Query parameters for the signal list.
#[derive(Debug, Deserialize)]
pub struct SignalsQuery {
    pub symbol: Option<String>,
    pub acknowledged: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SignalsResponse {
    pub signals: Vec<SignalEvent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgeResponse {
    pub status: &'static str,
    pub id: i64,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/signals", get(list_signals))
        .route("/api/signals/:id", get(get_signal))
        .route("/api/signals/:id/acknowledge", post(acknowledge_signal))
}

fn build_filter(query: SignalsQuery) -> Result<SignalFilter> {
    let limit = bounded("limit", query.limit, DEFAULT_LIMIT, 1, MAX_LIMIT)?;
    Ok(SignalFilter {
        symbol: query
            .symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty()),
        acknowledged: query.acknowledged,
        limit: limit as usize,
    })
}

/// Recent signals, newest first.
async fn list_signals(
    State(state): State<AppState>,
    Query(query): Query<SignalsQuery>,
) -> Result<Json<SignalsResponse>> {
    let filter = build_filter(query)?;
    let signals = state.signal_log.query(&filter)?;
    Ok(Json(SignalsResponse { signals }))
}

async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SignalEvent>> {
    state
        .signal_log
        .get(id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Signal {} not found", id)))
}

async fn acknowledge_signal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AcknowledgeResponse>> {
    if !state.signal_log.acknowledge(id)? {
        return Err(AppError::NotFound(format!("Signal {} not found", id)));
    }

    let acknowledged_at = state.signal_log.get(id)?.and_then(|s| s.acknowledged_at);
    Ok(Json(AcknowledgeResponse {
        status: "acknowledged",
        id,
        acknowledged_at,
    }))
}
