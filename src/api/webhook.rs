//! Indicator ingestion endpoints (TradingView webhook and direct API push).

use crate::error::{AppError, Result};
use crate::services::IngestOutcome;
use crate::types::IndicatorUpdate;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook/tradingview", post(receive_webhook))
        .route("/api/indicators", post(receive_webhook))
}

/// Reject updates whose secret does not match the configured one.
fn check_secret(expected: Option<&str>, update: &IndicatorUpdate) -> Result<()> {
    match expected {
        Some(expected) if update.secret.as_deref() != Some(expected) => {
            warn!("Rejected update for {} with bad secret", update.symbol);
            Err(AppError::Unauthorized("Invalid webhook secret".to_string()))
        }
        _ => Ok(()),
    }
}

async fn receive_webhook(
    State(state): State<AppState>,
    Json(update): Json<IndicatorUpdate>,
) -> Result<Json<IngestResponse>> {
    check_secret(state.config.webhook_secret.as_deref(), &update)?;

    let outcome = state.ingest.ingest(update)?;

    Ok(Json(IngestResponse {
        status: "ok",
        outcome,
    }))
}
