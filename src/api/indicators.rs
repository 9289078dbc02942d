//! Indicator query endpoints.

use crate::api::bounded;
use crate::error::{AppError, Result};
use crate::types::{HistoryPoint, LatestIndicators};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest history window, in hours (7 days).
const MAX_HISTORY_HOURS: i64 = 168;
const DEFAULT_HISTORY_HOURS: i64 = 24;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorValueResponse {
    pub symbol: String,
    pub indicator: String,
    pub value: Option<f64>,
    pub value2: Option<f64>,
    pub value3: Option<f64>,
    pub timeframe: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorHistoryResponse {
    pub symbol: String,
    pub indicator: String,
    pub hours: i64,
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:symbol", get(get_indicators))
        .route("/:symbol/:indicator", get(get_indicator))
        .route("/:symbol/:indicator/history", get(get_indicator_history))
}

/// All current indicators for a symbol. Unknown symbols yield an empty map.
async fn get_indicators(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<LatestIndicators>> {
    let symbol = symbol.to_uppercase();
    Ok(Json(state.indicators.latest(&symbol)?))
}

async fn get_indicator(
    State(state): State<AppState>,
    Path((symbol, indicator)): Path<(String, String)>,
) -> Result<Json<IndicatorValueResponse>> {
    let symbol = symbol.to_uppercase();
    let indicator = indicator.to_lowercase();

    let latest = state
        .indicators
        .latest_value(&symbol, &indicator)?
        .ok_or_else(|| AppError::NotFound(format!("No {} data for {}", indicator, symbol)))?;

    Ok(Json(IndicatorValueResponse {
        symbol,
        indicator,
        value: latest.value,
        value2: latest.value2,
        value3: latest.value3,
        timeframe: latest.timeframe,
        last_updated: latest.updated_at,
    }))
}

async fn get_indicator_history(
    State(state): State<AppState>,
    Path((symbol, indicator)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<IndicatorHistoryResponse>> {
    let hours = bounded("hours", query.hours, DEFAULT_HISTORY_HOURS, 1, MAX_HISTORY_HOURS)?;
    let symbol = symbol.to_uppercase();
    let indicator = indicator.to_lowercase();

    let history = state
        .indicators
        .history(&symbol, &indicator, Duration::hours(hours))?;

    Ok(Json(IndicatorHistoryResponse {
        symbol,
        indicator,
        hours,
        history,
    }))
}
