//! Ingestion path: name mapping, storage and synchronous detection.

use crate::services::database::StoreError;
use crate::services::indicator_store::IndicatorStore;
use crate::services::signals::{IndicatorSnapshot, SignalDetector};
use crate::types::{IndicatorUpdate, NewObservation, SignalEvent, DEFAULT_SOURCE};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Indicator {0} carries no values")]
    NoValues(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One stored indicator row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIndicator {
    pub id: i64,
    pub name: String,
    pub projected: bool,
}

/// Result of ingesting one update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub symbol: String,
    pub stored: Vec<StoredIndicator>,
    pub signals: Vec<SignalEvent>,
    pub received_at: DateTime<Utc>,
}

/// Name and components of one stored indicator produced by expansion.
#[derive(Debug, Clone, PartialEq)]
struct Component {
    name: String,
    value: Option<f64>,
    value2: Option<f64>,
    value3: Option<f64>,
}

impl Component {
    fn single(name: &str, value: Option<f64>) -> Option<Self> {
        value.map(|v| Self {
            name: name.to_string(),
            value: Some(v),
            value2: None,
            value3: None,
        })
    }
}

/// Map an incoming indicator name to the stored indicator(s).
///
/// MACD and Bollinger updates split into one stored name per component that
/// is present. Unknown names pass through lower-cased with all components.
fn expand(
    indicator: &str,
    timeframe: &str,
    value: Option<f64>,
    value2: Option<f64>,
    value3: Option<f64>,
) -> Vec<Component> {
    let upper = indicator.trim().to_uppercase();

    let passthrough = |name: String| {
        vec![Component {
            name,
            value,
            value2,
            value3,
        }]
    };

    match upper.as_str() {
        "MACD" => [
            Component::single("macd_line", value),
            Component::single("macd_signal", value2),
            Component::single("macd_histogram", value3),
        ]
        .into_iter()
        .flatten()
        .collect(),
        "BB" | "BOLLINGER" => [
            Component::single("bb_upper", value),
            Component::single("bb_lower", value2),
        ]
        .into_iter()
        .flatten()
        .collect(),
        "RSI" => passthrough(format!("rsi_{}", timeframe.trim().to_lowercase())),
        "MACD_LINE" => passthrough("macd_line".to_string()),
        "MACD_SIGNAL" => passthrough("macd_signal".to_string()),
        "MACD_HISTOGRAM" => passthrough("macd_histogram".to_string()),
        "MA200" | "200MA" => passthrough("ma_200".to_string()),
        "ATR" => passthrough("atr_14".to_string()),
        "VOLUME" => passthrough("volume_ratio".to_string()),
        "BB_UPPER" => passthrough("bb_upper".to_string()),
        "BB_LOWER" => passthrough("bb_lower".to_string()),
        "PRICE" => passthrough("price".to_string()),
        _ => passthrough(indicator.trim().to_lowercase()),
    }
}

/// Stores indicator updates and runs detection for the affected symbol.
pub struct IngestService {
    indicators: Arc<IndicatorStore>,
    detector: Arc<SignalDetector>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IngestService {
    pub fn new(indicators: Arc<IndicatorStore>, detector: Arc<SignalDetector>) -> Arc<Self> {
        Arc::new(Self {
            indicators,
            detector,
            locks: DashMap::new(),
        })
    }

    /// Ingest a raw update from the webhook or API.
    pub fn ingest(&self, update: IndicatorUpdate) -> Result<IngestOutcome, IngestError> {
        let received_at = Utc::now();
        let symbol = update.symbol.trim().to_uppercase();
        let observed_at = update.timestamp.unwrap_or(received_at);
        let source = update
            .source
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        let components = expand(
            &update.indicator,
            &update.timeframe,
            update.value,
            update.value2,
            update.value3,
        );
        if components.is_empty() {
            return Err(IngestError::NoValues(update.indicator));
        }

        if let Some(message) = &update.message {
            debug!("Update message for {} {}: {}", symbol, update.indicator, message);
        }

        let observations = components
            .into_iter()
            .map(|c| NewObservation {
                symbol: symbol.clone(),
                name: c.name,
                value: c.value,
                value2: c.value2,
                value3: c.value3,
                timeframe: update.timeframe.clone(),
                source: source.clone(),
                observed_at,
            })
            .collect();

        let outcome = self.ingest_observations(&symbol, observations, received_at)?;
        info!(
            "Ingested {} for {} ({} stored, {} signals)",
            update.indicator,
            symbol,
            outcome.stored.len(),
            outcome.signals.len()
        );
        Ok(outcome)
    }

    /// Store already-mapped observations for one symbol and run detection.
    ///
    /// Storage, snapshot and detection run under the symbol's ingestion lock so
    /// the detector sees snapshots in the order they were projected.
    pub fn ingest_observations(
        &self,
        symbol: &str,
        observations: Vec<NewObservation>,
        received_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let lock = self
            .locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let outcome = {
            let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;
            self.store_and_detect(symbol, observations, received_at)
        };

        // Drop the entry unless another ingest for the symbol holds a handle.
        self.locks
            .remove_if(symbol, |_, held| Arc::strong_count(held) <= 2);
        outcome
    }

    fn store_and_detect(
        &self,
        symbol: &str,
        observations: Vec<NewObservation>,
        received_at: DateTime<Utc>,
    ) -> Result<IngestOutcome, IngestError> {
        let mut stored = Vec::with_capacity(observations.len());
        for obs in &observations {
            let recorded = self.indicators.record(obs)?;
            stored.push(StoredIndicator {
                id: recorded.id,
                name: obs.name.clone(),
                projected: recorded.projected,
            });
        }

        let signals = if stored.iter().any(|s| s.projected) {
            let latest = self.indicators.latest(symbol)?;
            self.detector
                .evaluate(symbol, IndicatorSnapshot::from_latest(&latest))?
        } else {
            debug!("No projection change for {}; skipping detection", symbol);
            Vec::new()
        };

        Ok(IngestOutcome {
            symbol: symbol.to_string(),
            stored,
            signals,
            received_at,
        })
    }
}
