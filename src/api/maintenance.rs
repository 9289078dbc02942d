//! Maintenance endpoints: manual retention cleanup and storage stats.

use crate::api::bounded;
use crate::config::MAX_RETENTION_DAYS;
use crate::error::Result;
use crate::services::PurgeReport;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub tables: BTreeMap<String, u64>,
    pub last_cleanup: Option<PurgeReport>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cleanup", post(run_cleanup))
        .route("/stats", get(get_stats))
}

/// Purge history and acknowledged signals older than `days` (1-365).
async fn run_cleanup(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<PurgeReport>> {
    let default_days = i64::from(state.config.retention.retention_days);
    let days = bounded("days", query.days, default_days, 1, i64::from(MAX_RETENTION_DAYS))?;

    let report = state.retention.run_cleanup(Duration::days(days)).await?;
    Ok(Json(report))
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let tables = state.database.table_counts()?.into_iter().collect();
    Ok(Json(StatsResponse {
        tables,
        last_cleanup: state.retention.last_report().await,
    }))
}
