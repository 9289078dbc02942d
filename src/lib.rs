//! Tradewatch - indicator ingestion, signal detection and market assessment server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use axum::Router;
use config::Config;
use services::{
    AssessmentLog, AssessmentService, Database, ExchangeManager, IndicatorStore, IngestService,
    PositionStore, RetentionService, SignalDetector, SignalLog, SummaryService,
};
use sources::{BinanceAccountClient, MarketDataClient};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub database: Arc<Database>,
    pub indicators: Arc<IndicatorStore>,
    pub signal_log: Arc<SignalLog>,
    pub positions: Arc<PositionStore>,
    pub detector: Arc<SignalDetector>,
    pub ingest: Arc<IngestService>,
    pub summary: Arc<SummaryService>,
    pub retention: Arc<RetentionService>,
    pub exchanges: Arc<ExchangeManager>,
    pub assessments: Arc<AssessmentService>,
}

impl AppState {
    /// Wire every component on top of an opened database.
    pub fn new(config: Config, database: Database) -> Self {
        let config = Arc::new(config);
        let database = Arc::new(database);

        let indicators = IndicatorStore::new(database.clone());
        let signal_log = SignalLog::new(database.clone());
        let positions = PositionStore::new(database.clone());
        let detector = SignalDetector::new(signal_log.clone(), config.detector.clone());
        let ingest = IngestService::new(indicators.clone(), detector.clone());
        let summary = SummaryService::new(database.clone());
        let retention = RetentionService::new(
            indicators.clone(),
            signal_log.clone(),
            config.retention.clone(),
        );

        let binance = config.binance_credentials().map(|(key, secret)| {
            info!("Binance credentials found, enabling account sync");
            BinanceAccountClient::new(key.to_string(), secret.to_string())
        });
        let exchanges = ExchangeManager::new(binance, positions.clone());

        let market = config
            .assessment
            .fetch_market_data
            .then(MarketDataClient::new);
        let assessments = AssessmentService::new(
            ingest.clone(),
            summary.clone(),
            AssessmentLog::new(database.clone()),
            market,
            config.assessment.clone(),
        );

        Self {
            config,
            database,
            indicators,
            signal_log,
            positions,
            detector,
            ingest,
            summary,
            retention,
            exchanges,
            assessments,
        }
    }

    /// Start the background tasks (retention cleanup, periodic assessments).
    pub fn start_background_tasks(&self) {
        self.retention.clone().start();
        self.assessments.clone().start();
    }
}

/// Build the HTTP application.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
