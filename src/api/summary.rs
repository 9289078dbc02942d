use crate::error::Result;
use crate::types::{MarketSummary, PortfolioValue};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub symbol: Option<String>,
}

/// Market summary with the portfolio value across exchanges.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: MarketSummary,
    pub exchange_value: PortfolioValue,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/summary", get(get_summary))
}

async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<SummaryResponse>> {
    let symbol = query
        .symbol
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.config.default_symbol.clone());

    let summary = state.summary.summarize(&symbol)?;
    let exchange_value = state.exchanges.total_value()?;

    Ok(Json(SummaryResponse {
        summary,
        exchange_value,
    }))
}
