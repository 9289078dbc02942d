//! Market assessment endpoints.

use crate::api::bounded;
use crate::error::Result;
use crate::types::Assessment;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AssessmentsQuery {
    pub symbol: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RunQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentsResponse {
    pub assessments: Vec<Assessment>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/assessments", get(list_assessments))
        .route("/api/assessments/run", post(run_assessment))
}

fn normalize(symbol: Option<String>) -> Option<String> {
    symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
}

async fn list_assessments(
    State(state): State<AppState>,
    Query(query): Query<AssessmentsQuery>,
) -> Result<Json<AssessmentsResponse>> {
    let limit = bounded("limit", query.limit, 10, 1, 100)?;
    let symbol = normalize(query.symbol);

    let assessments = state
        .assessments
        .log()
        .recent(symbol.as_deref(), limit as usize)?;
    Ok(Json(AssessmentsResponse { assessments }))
}

/// Run an assessment now and return it.
async fn run_assessment(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<Assessment>> {
    let symbol = normalize(query.symbol).unwrap_or_else(|| state.config.default_symbol.clone());
    Ok(Json(state.assessments.run(&symbol).await?))
}
