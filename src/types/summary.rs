use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Position, SignalEvent};

/// Trend relative to the 200-period moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    /// BULLISH above the MA, BEARISH below, NEUTRAL when equal or unknown.
    pub fn from_price(price: Option<f64>, ma_200: Option<f64>) -> Self {
        match (price, ma_200) {
            (Some(p), Some(ma)) if p > ma => Self::Bullish,
            (Some(p), Some(ma)) if p < ma => Self::Bearish,
            _ => Self::Neutral,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdReading {
    pub line: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BollingerReading {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

/// Keyed view of the indicators consumers care about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyIndicators {
    pub rsi_daily: Option<f64>,
    pub rsi_4h: Option<f64>,
    pub macd: MacdReading,
    pub ma_200: Option<f64>,
    pub above_200ma: Option<bool>,
    pub atr: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub bollinger: BollingerReading,
}

/// Point-in-time read model for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub generated_at: DateTime<Utc>,
    pub symbol: String,
    pub price: Option<f64>,
    pub trend: Trend,
    pub indicators: KeyIndicators,
    pub recent_signals: Vec<SignalEvent>,
    pub positions: Vec<Position>,
    pub total_unrealized_pnl: f64,
    /// Last indicator update, `None` when no indicator was ever stored.
    pub data_freshness: Option<DateTime<Utc>>,
}
