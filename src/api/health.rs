use crate::error::Result;
use crate::services::ExchangeStatus;
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: DateTime<Utc>,
    symbols: Vec<String>,
    /// Indicators currently held for the default symbol.
    data_points: usize,
    exchanges: BTreeMap<String, ExchangeStatus>,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let symbols = state.indicators.symbols()?;
    let latest = state.indicators.latest(&state.config.default_symbol)?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        symbols,
        data_points: latest.indicators.len(),
        exchanges: state.exchanges.status(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::Database;
    use crate::types::NewObservation;

    fn state() -> AppState {
        AppState::new(Config::default(), Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "1.0.0",
            timestamp: Utc::now(),
            symbols: vec!["BTCUSD".to_string()],
            data_points: 3,
            exchanges: BTreeMap::new(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"version\":\"1.0.0\""));
        assert!(json.contains("\"dataPoints\":3"));
    }

    #[tokio::test]
    async fn test_health_handler_empty() {
        let Json(response) = health(State(state())).await.unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert!(response.symbols.is_empty());
        assert_eq!(response.data_points, 0);
        assert!(!response.exchanges["binance"].connected);
    }

    #[tokio::test]
    async fn test_health_handler_counts_default_symbol() {
        let state = state();
        state
            .indicators
            .record(&NewObservation::new("BTCUSD", "rsi_1d", 45.0))
            .unwrap();
        state
            .indicators
            .record(&NewObservation::new("BTCUSD", "price", 48_000.0))
            .unwrap();
        state
            .indicators
            .record(&NewObservation::new("ETHUSD", "price", 3_000.0))
            .unwrap();

        let Json(response) = health(State(state)).await.unwrap();
        assert_eq!(response.data_points, 2);
        assert_eq!(response.symbols.len(), 2);
    }
}
