use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a stored label does not match any known variant.
#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of detected signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    RsiOversold,
    RsiOverbought,
    RsiExtremeOversold,
    RsiExtremeOverbought,
    MacdBullishCross,
    MacdBearishCross,
    MacdDivergence,
    Ma200BullishCross,
    Ma200BearishCross,
    BbUpperTouch,
    BbLowerTouch,
}

impl SignalType {
    pub const ALL: [SignalType; 11] = [
        Self::RsiOversold,
        Self::RsiOverbought,
        Self::RsiExtremeOversold,
        Self::RsiExtremeOverbought,
        Self::MacdBullishCross,
        Self::MacdBearishCross,
        Self::MacdDivergence,
        Self::Ma200BullishCross,
        Self::Ma200BearishCross,
        Self::BbUpperTouch,
        Self::BbLowerTouch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RsiOversold => "RSI_OVERSOLD",
            Self::RsiOverbought => "RSI_OVERBOUGHT",
            Self::RsiExtremeOversold => "RSI_EXTREME_OVERSOLD",
            Self::RsiExtremeOverbought => "RSI_EXTREME_OVERBOUGHT",
            Self::MacdBullishCross => "MACD_BULLISH_CROSS",
            Self::MacdBearishCross => "MACD_BEARISH_CROSS",
            Self::MacdDivergence => "MACD_DIVERGENCE",
            Self::Ma200BullishCross => "MA200_BULLISH_CROSS",
            Self::Ma200BearishCross => "MA200_BEARISH_CROSS",
            Self::BbUpperTouch => "BB_UPPER_TOUCH",
            Self::BbLowerTouch => "BB_LOWER_TOUCH",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseLabelError {
                kind: "signal type",
                value: s.to_string(),
            })
    }
}

/// Market direction implied by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalDirection {
    Bullish,
    Bearish,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
        }
    }
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalDirection {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BULLISH" => Ok(Self::Bullish),
            "BEARISH" => Ok(Self::Bearish),
            other => Err(ParseLabelError {
                kind: "signal direction",
                value: other.to_string(),
            }),
        }
    }
}

/// Signal strength classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalStrength {
    Weak,
    Medium,
    Strong,
}

impl SignalStrength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weak => "WEAK",
            Self::Medium => "MEDIUM",
            Self::Strong => "STRONG",
        }
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStrength {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEAK" => Ok(Self::Weak),
            "MEDIUM" => Ok(Self::Medium),
            "STRONG" => Ok(Self::Strong),
            other => Err(ParseLabelError {
                kind: "signal strength",
                value: other.to_string(),
            }),
        }
    }
}

/// A persisted signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalEvent {
    pub id: i64,
    pub symbol: String,
    pub signal_type: SignalType,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    pub price_at_signal: Option<f64>,
    /// Indicator values at detection time.
    pub indicator_snapshot: BTreeMap<String, f64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// A signal ready to be appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSignal {
    pub symbol: String,
    pub signal_type: SignalType,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    pub price_at_signal: Option<f64>,
    pub indicator_snapshot: BTreeMap<String, f64>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewSignal {
    /// Convert into the persisted form once an id has been assigned.
    pub fn into_event(self, id: i64) -> SignalEvent {
        SignalEvent {
            id,
            symbol: self.symbol,
            signal_type: self.signal_type,
            direction: self.direction,
            strength: self.strength,
            price_at_signal: self.price_at_signal,
            indicator_snapshot: self.indicator_snapshot,
            message: self.message,
            created_at: self.created_at,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// Filter for signal log queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalFilter {
    pub symbol: Option<String>,
    pub acknowledged: Option<bool>,
    pub limit: usize,
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self {
            symbol: None,
            acknowledged: None,
            limit: 50,
        }
    }
}

impl SignalFilter {
    pub fn for_symbol(symbol: &str, limit: usize) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            acknowledged: None,
            limit,
        }
    }
}
