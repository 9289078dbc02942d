use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseLabelError;

/// Directional bias of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bias {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BULLISH" => Ok(Self::Bullish),
            "BEARISH" => Ok(Self::Bearish),
            "NEUTRAL" => Ok(Self::Neutral),
            other => Err(ParseLabelError {
                kind: "bias",
                value: other.to_string(),
            }),
        }
    }
}

/// Market-wide context polled from public data APIs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub fear_greed: Option<u32>,
    pub fear_greed_label: Option<String>,
    /// Funding rate in percent per 8h interval.
    pub funding_rate: Option<f64>,
    pub funding_annualized: Option<f64>,
    pub open_interest: Option<f64>,
    pub long_pct: Option<f64>,
    pub short_pct: Option<f64>,
}

impl MarketContext {
    /// Set funding from a raw fractional rate (0.0001 = 0.01%).
    pub fn set_funding(&mut self, raw_rate: f64) {
        self.funding_rate = Some(raw_rate * 100.0);
        self.funding_annualized = Some(raw_rate * 3.0 * 365.0 * 100.0);
    }

    /// Set long/short split from the long/short account ratio.
    pub fn set_long_short_ratio(&mut self, ratio: f64) {
        let long_pct = ratio / (1.0 + ratio) * 100.0;
        self.long_pct = Some(long_pct);
        self.short_pct = Some(100.0 - long_pct);
    }
}

/// Textual market assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: i64,
    pub symbol: String,
    pub title: String,
    pub content: String,
    pub bias: Bias,
    pub confidence: f64,
    pub sentiment: Option<String>,
    pub market_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Assessment before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssessment {
    pub symbol: String,
    pub title: String,
    pub content: String,
    pub bias: Bias,
    pub confidence: f64,
    pub sentiment: Option<String>,
    pub market_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewAssessment {
    pub fn into_assessment(self, id: i64) -> Assessment {
        Assessment {
            id,
            symbol: self.symbol,
            title: self.title,
            content: self.content,
            bias: self.bias,
            confidence: self.confidence,
            sentiment: self.sentiment,
            market_data: self.market_data,
            created_at: self.created_at,
        }
    }
}
