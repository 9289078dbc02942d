//! Public market context: fear & greed, funding, open interest, long/short ratio.

use crate::types::MarketContext;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const FEAR_GREED_URL: &str = "https://api.alternative.me/fng/";
const FUTURES_API_URL: &str = "https://fapi.binance.com";
const REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct FearGreedResponse {
    data: Vec<FearGreedEntry>,
}

#[derive(Debug, Deserialize)]
struct FearGreedEntry {
    value: String,
    value_classification: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FundingRateEntry {
    funding_rate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestResponse {
    open_interest: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LongShortEntry {
    long_short_ratio: String,
}

/// Binance USDT-margined perpetual pair for a tracked symbol ("BTCUSD" -> "BTCUSDT").
pub fn futures_pair(symbol: &str) -> String {
    let symbol = symbol.trim().to_uppercase();
    if symbol.ends_with("USDT") {
        symbol
    } else if let Some(base) = symbol.strip_suffix("USD") {
        format!("{}USDT", base)
    } else {
        format!("{}USDT", symbol)
    }
}

fn parse_num(value: &str) -> anyhow::Result<f64> {
    let parsed: f64 = value.trim().parse()?;
    if !parsed.is_finite() {
        return Err(anyhow::anyhow!("Non-finite value: {}", value));
    }
    Ok(parsed)
}

/// Client for public market data endpoints.
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
}

impl Default for MarketDataClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent("tradewatch/0.1")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let response = self.client.get(url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("{} returned {}", url, response.status()));
        }

        Ok(response.json().await?)
    }

    /// Fear & Greed index value and label.
    pub async fn fear_greed(&self) -> anyhow::Result<(u32, String)> {
        let response: FearGreedResponse = self.get_json(FEAR_GREED_URL, &[("limit", "1")]).await?;
        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty fear & greed response"))?;
        Ok((entry.value.trim().parse()?, entry.value_classification))
    }

    /// Latest raw funding rate (fraction per 8h).
    pub async fn funding_rate(&self, pair: &str) -> anyhow::Result<f64> {
        let url = format!("{}/fapi/v1/fundingRate", FUTURES_API_URL);
        let entries: Vec<FundingRateEntry> = self
            .get_json(&url, &[("symbol", pair), ("limit", "1")])
            .await?;
        let entry = entries
            .last()
            .ok_or_else(|| anyhow::anyhow!("No funding rate for {}", pair))?;
        parse_num(&entry.funding_rate)
    }

    /// Open interest in contracts.
    pub async fn open_interest(&self, pair: &str) -> anyhow::Result<f64> {
        let url = format!("{}/fapi/v1/openInterest", FUTURES_API_URL);
        let response: OpenInterestResponse = self.get_json(&url, &[("symbol", pair)]).await?;
        parse_num(&response.open_interest)
    }

    /// Global long/short account ratio over the last hour.
    pub async fn long_short_ratio(&self, pair: &str) -> anyhow::Result<f64> {
        let url = format!("{}/futures/data/globalLongShortAccountRatio", FUTURES_API_URL);
        let entries: Vec<LongShortEntry> = self
            .get_json(&url, &[("symbol", pair), ("period", "1h"), ("limit", "1")])
            .await?;
        let entry = entries
            .last()
            .ok_or_else(|| anyhow::anyhow!("No long/short ratio for {}", pair))?;
        parse_num(&entry.long_short_ratio)
    }

    /// Collect all context for a symbol. Each failed source leaves its fields empty.
    pub async fn collect(&self, symbol: &str) -> MarketContext {
        let pair = futures_pair(symbol);
        let mut context = MarketContext::default();

        let (fng, funding, oi, ratio) = tokio::join!(
            self.fear_greed(),
            self.funding_rate(&pair),
            self.open_interest(&pair),
            self.long_short_ratio(&pair),
        );

        match fng {
            Ok((value, label)) => {
                context.fear_greed = Some(value);
                context.fear_greed_label = Some(label);
            }
            Err(e) => warn!("Failed to fetch fear & greed: {}", e),
        }
        match funding {
            Ok(rate) => context.set_funding(rate),
            Err(e) => warn!("Failed to fetch funding rate for {}: {}", pair, e),
        }
        match oi {
            Ok(value) => context.open_interest = Some(value),
            Err(e) => warn!("Failed to fetch open interest for {}: {}", pair, e),
        }
        match ratio {
            Ok(value) => context.set_long_short_ratio(value),
            Err(e) => warn!("Failed to fetch long/short ratio for {}: {}", pair, e),
        }

        debug!("Market context for {}: {:?}", symbol, context);
        context
    }
}
