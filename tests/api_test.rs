//! Integration tests for API endpoints

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use tradewatch::config::Config;
use tradewatch::services::Database;
use tradewatch::{app, AppState};

fn config() -> Config {
    let mut config = Config::default();
    config.assessment.fetch_market_data = false;
    config
}

fn router_with(config: Config) -> Router {
    app(AppState::new(config, Database::open_in_memory().unwrap()))
}

fn router() -> Router {
    router_with(config())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::post(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(router: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    send(
        router,
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let router = router();
    let (status, body) = get(&router, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
    assert_eq!(body["dataPoints"], 0);
    assert_eq!(body["exchanges"]["binance"]["connected"], false);
}

// =============================================================================
// Ingestion
// =============================================================================

#[tokio::test]
async fn test_webhook_ingest_and_query() {
    let router = router();

    let (status, body) = post_json(
        &router,
        "/webhook/tradingview",
        json!({"symbol": "btcusd", "indicator": "RSI", "value": 42.5, "timeframe": "1D"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["symbol"], "BTCUSD");
    assert_eq!(body["stored"][0]["name"], "rsi_1d");

    let (status, body) = get(&router, "/api/indicators/btcusd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicators"]["rsi_1d"]["value"], 42.5);
    assert!(body["lastUpdated"].is_string());

    let (status, body) = get(&router, "/api/indicators/BTCUSD/RSI_1D").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicator"], "rsi_1d");
    assert_eq!(body["value"], 42.5);

    let (status, body) = get(&router, "/api/indicators/BTCUSD/rsi_1d/history?hours=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hours"], 1);
    assert_eq!(body["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_api_push_with_indicator_name_field() {
    let router = router();
    let (status, _) = post_json(
        &router,
        "/api/indicators",
        json!({"symbol": "ETHUSD", "indicator_name": "PRICE", "value": 3000.0, "source": "manual"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&router, "/api/indicators/ETHUSD/price").await;
    assert_eq!(body["value"], 3000.0);
}

#[tokio::test]
async fn test_webhook_secret() {
    let mut config = config();
    config.webhook_secret = Some("s3cret".to_string());
    let router = router_with(config);

    let (status, body) = post_json(
        &router,
        "/webhook/tradingview",
        json!({"indicator": "PRICE", "value": 1.0, "secret": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let (status, _) = post_json(
        &router,
        "/webhook/tradingview",
        json!({"indicator": "PRICE", "value": 1.0, "secret": "s3cret"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_composite_without_values_is_bad_request() {
    let router = router();
    let (status, body) = post_json(&router, "/webhook/tradingview", json!({"indicator": "MACD"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].is_string());
}

// =============================================================================
// Indicators
// =============================================================================

#[tokio::test]
async fn test_unknown_symbol_is_empty_not_error() {
    let router = router();
    let (status, body) = get(&router, "/api/indicators/NOPE").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicators"], json!({}));
    assert!(body["lastUpdated"].is_null());
}

#[tokio::test]
async fn test_missing_indicator_is_not_found() {
    let router = router();
    let (status, body) = get(&router, "/api/indicators/BTCUSD/rsi_1d").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_history_hours_out_of_range() {
    let router = router();
    for hours in [0, 169] {
        let uri = format!("/api/indicators/BTCUSD/price/history?hours={}", hours);
        let (status, _) = get(&router, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Signals
// =============================================================================

#[tokio::test]
async fn test_signal_flow() {
    let router = router();
    post_json(&router, "/webhook/tradingview", json!({"indicator": "RSI", "value": 32.0})).await;
    post_json(&router, "/webhook/tradingview", json!({"indicator": "RSI", "value": 28.0})).await;

    let (status, body) = get(&router, "/api/signals?symbol=btcusd").await;
    assert_eq!(status, StatusCode::OK);
    let signals = body["signals"].as_array().unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0]["signalType"], "RSI_OVERSOLD");
    assert_eq!(signals[0]["direction"], "BULLISH");
    let id = signals[0]["id"].as_i64().unwrap();

    let (status, body) = post(&router, &format!("/api/signals/{}/acknowledge", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "acknowledged");

    let (status, _) = post(&router, &format!("/api/signals/{}/acknowledge", id)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&router, &format!("/api/signals/{}", id)).await;
    assert_eq!(body["acknowledged"], true);

    let (_, body) = get(&router, "/api/signals?acknowledged=false").await;
    assert!(body["signals"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledge_unknown_signal() {
    let router = router();
    let (status, body) = post(&router, "/api/signals/424242/acknowledge").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_signal_limit_validation() {
    let router = router();
    assert_eq!(get(&router, "/api/signals?limit=0").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(get(&router, "/api/signals?limit=101").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(get(&router, "/api/signals?limit=100").await.0, StatusCode::OK);
}

// =============================================================================
// Positions, summary, maintenance
// =============================================================================

#[tokio::test]
async fn test_positions_and_exchanges() {
    let router = router();

    let (status, body) = get(&router, "/api/positions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positions"], json!([]));

    let (_, body) = get(&router, "/api/balances?exchange=binance").await;
    assert_eq!(body["balances"], json!([]));

    let (_, body) = get(&router, "/api/exchanges/status").await;
    assert_eq!(body["binance"]["type"], "spot+futures");

    let (status, body) = post(&router, "/api/exchanges/sync").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "sync_started");
}

#[tokio::test]
async fn test_summary_defaults_to_configured_symbol() {
    let router = router();
    post_json(&router, "/webhook/tradingview", json!({"indicator": "PRICE", "value": 48000.0})).await;
    post_json(&router, "/webhook/tradingview", json!({"indicator": "MA200", "value": 45000.0})).await;

    let (status, body) = get(&router, "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "BTCUSD");
    assert_eq!(body["price"], 48000.0);
    assert_eq!(body["trend"], "BULLISH");
    assert_eq!(body["exchangeValue"]["totalValue"], 0.0);
}

#[tokio::test]
async fn test_cleanup_validation_and_report() {
    let router = router();
    assert_eq!(
        post(&router, "/api/maintenance/cleanup?days=0").await.0,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        post(&router, "/api/maintenance/cleanup?days=366").await.0,
        StatusCode::BAD_REQUEST
    );

    let (status, body) = post(&router, "/api/maintenance/cleanup?days=30").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indicatorsDeleted"], 0);
    assert_eq!(body["signalsDeleted"], 0);

    let (_, body) = get(&router, "/api/maintenance/stats").await;
    assert_eq!(body["tables"]["trading_signals"], 0);
    assert!(body["lastCleanup"].is_object());
}

#[tokio::test]
async fn test_assessment_run_and_list() {
    let router = router();
    post_json(&router, "/webhook/tradingview", json!({"indicator": "RSI", "value": 25.0})).await;

    let (status, body) = post(&router, "/api/assessments/run?symbol=btcusd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "BTCUSD");
    assert!(body["content"].as_str().unwrap().contains("RSI"));

    let (_, body) = get(&router, "/api/assessments?symbol=BTCUSD").await;
    assert_eq!(body["assessments"].as_array().unwrap().len(), 1);
}
