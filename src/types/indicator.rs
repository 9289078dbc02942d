use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbol used when an update does not name one.
pub const DEFAULT_SYMBOL: &str = "BTCUSD";
/// Timeframe used when an update does not name one.
pub const DEFAULT_TIMEFRAME: &str = "1D";
/// Provenance tag for webhook pushes.
pub const DEFAULT_SOURCE: &str = "tradingview";

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

fn default_timeframe() -> String {
    DEFAULT_TIMEFRAME.to_string()
}

/// Raw indicator update as received from a webhook or API push.
#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorUpdate {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Incoming indicator name ("RSI", "MACD", "BB", ...).
    #[serde(alias = "indicator_name", alias = "indicatorName")]
    pub indicator: String,
    #[serde(default)]
    pub value: Option<f64>,
    /// Second component (MACD signal, lower Bollinger band).
    #[serde(default)]
    pub value2: Option<f64>,
    /// Third component (MACD histogram).
    #[serde(default)]
    pub value3: Option<f64>,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    /// Observation time; receive time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IndicatorUpdate {
    /// Create a single-value update with default timeframe and source.
    pub fn new(symbol: &str, indicator: &str, value: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            indicator: indicator.to_string(),
            value: Some(value),
            value2: None,
            value3: None,
            timeframe: default_timeframe(),
            source: None,
            message: None,
            secret: None,
            timestamp: None,
        }
    }

    pub fn with_timeframe(mut self, timeframe: &str) -> Self {
        self.timeframe = timeframe.to_string();
        self
    }

    pub fn with_components(mut self, value2: Option<f64>, value3: Option<f64>) -> Self {
        self.value2 = value2;
        self.value3 = value3;
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Observation to be appended to indicator history.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub symbol: String,
    pub name: String,
    pub value: Option<f64>,
    pub value2: Option<f64>,
    pub value3: Option<f64>,
    pub timeframe: String,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

impl NewObservation {
    /// Single-value observation stamped now.
    pub fn new(symbol: &str, name: &str, value: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            value: Some(value),
            value2: None,
            value3: None,
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            source: DEFAULT_SOURCE.to_string(),
            observed_at: Utc::now(),
        }
    }

    pub fn at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }
}

/// Result of appending an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedObservation {
    /// History row id.
    pub id: i64,
    /// Whether the latest projection now reflects this observation.
    pub projected: bool,
}

/// Latest known value of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestIndicator {
    pub value: Option<f64>,
    pub value2: Option<f64>,
    pub value3: Option<f64>,
    pub timeframe: String,
    pub updated_at: DateTime<Utc>,
}

/// All latest indicator values for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestIndicators {
    pub symbol: String,
    pub indicators: BTreeMap<String, LatestIndicator>,
    /// Most recent `updated_at` across all rows, `None` when nothing is stored.
    pub last_updated: Option<DateTime<Utc>>,
}

impl LatestIndicators {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            indicators: BTreeMap::new(),
            last_updated: None,
        }
    }

    /// Primary value of a named indicator.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).and_then(|i| i.value)
    }

    /// Name -> primary value map, skipping indicators without one.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.indicators
            .iter()
            .filter_map(|(name, i)| i.value.map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// One point of indicator history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub value: Option<f64>,
    pub value2: Option<f64>,
    pub value3: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// Indicator names the detection rules interpret.
///
/// Everything else stays an open string at the storage boundary and maps to
/// [`IndicatorKind::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    Price,
    RsiDaily,
    Rsi,
    MacdLine,
    MacdSignal,
    MacdHistogram,
    Ma200,
    BbUpper,
    BbLower,
    Unrecognized,
}

impl IndicatorKind {
    /// Map a stored indicator name to its kind.
    pub fn from_name(name: &str) -> Self {
        match name {
            "price" => Self::Price,
            "rsi_1d" => Self::RsiDaily,
            "rsi" => Self::Rsi,
            "macd_line" => Self::MacdLine,
            "macd_signal" => Self::MacdSignal,
            "macd_histogram" => Self::MacdHistogram,
            "ma_200" => Self::Ma200,
            "bb_upper" => Self::BbUpper,
            "bb_lower" => Self::BbLower,
            _ => Self::Unrecognized,
        }
    }

    /// Stored name, `None` for unrecognized indicators.
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Self::Price => Some("price"),
            Self::RsiDaily => Some("rsi_1d"),
            Self::Rsi => Some("rsi"),
            Self::MacdLine => Some("macd_line"),
            Self::MacdSignal => Some("macd_signal"),
            Self::MacdHistogram => Some("macd_histogram"),
            Self::Ma200 => Some("ma_200"),
            Self::BbUpper => Some("bb_upper"),
            Self::BbLower => Some("bb_lower"),
            Self::Unrecognized => None,
        }
    }
}
