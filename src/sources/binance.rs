//! Binance account connector (futures positions and spot balances).

use crate::types::{NewBalance, NewPosition, PositionSide};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

pub const EXCHANGE: &str = "binance";

const SPOT_API_URL: &str = "https://api.binance.com";
const FUTURES_API_URL: &str = "https://fapi.binance.com";
const RECV_WINDOW_MS: u64 = 5000;
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Assets valued 1:1 in USD.
pub const STABLECOINS: &[&str] = &["USDT", "USDC", "BUSD", "USD"];

/// Futures position risk entry.
#[derive(Debug, Deserialize)]
struct PositionRisk {
    symbol: String,
    #[serde(rename = "positionAmt")]
    position_amt: String,
    #[serde(rename = "entryPrice")]
    entry_price: String,
    #[serde(rename = "markPrice")]
    mark_price: String,
    #[serde(rename = "unRealizedProfit")]
    unrealized_profit: String,
    #[serde(default)]
    leverage: Option<String>,
    #[serde(rename = "marginType", default)]
    margin_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotAccount {
    balances: Vec<SpotBalance>,
}

#[derive(Debug, Deserialize)]
struct SpotBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

fn parse_num(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a position risk entry, skipping flat positions.
fn position_from_risk(risk: &PositionRisk) -> Option<NewPosition> {
    let amount = parse_num(&risk.position_amt)?;
    if amount == 0.0 {
        return None;
    }

    let mut position = NewPosition::new(
        EXCHANGE,
        &risk.symbol,
        PositionSide::from_amount(amount),
        amount.abs(),
    );
    position.entry_price = parse_num(&risk.entry_price).filter(|p| *p > 0.0);
    position.current_price = parse_num(&risk.mark_price).filter(|p| *p > 0.0);
    position.unrealized_pnl = parse_num(&risk.unrealized_profit);
    position.leverage = risk
        .leverage
        .as_deref()
        .and_then(parse_num)
        .unwrap_or(1.0);
    position.margin_mode = risk.margin_type.clone();
    Some(position)
}

/// USD value of an asset amount given its USDT price, if known.
pub fn usd_value(asset: &str, amount: f64, usdt_price: Option<f64>) -> Option<f64> {
    if STABLECOINS.contains(&asset) {
        return Some(amount);
    }
    usdt_price.map(|p| amount * p)
}

/// Signed Binance REST client for account data.
#[derive(Clone)]
pub struct BinanceAccountClient {
    client: Client,
    api_key: String,
    api_secret: String,
}

impl BinanceAccountClient {
    pub fn new(api_key: String, api_secret: String) -> Self {
        let client = Client::builder()
            .user_agent("tradewatch/0.1")
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            api_secret,
        }
    }

    /// HMAC-SHA256 of a query string, hex encoded.
    pub fn sign(&self, query: &str) -> anyhow::Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid Binance API secret: {}", e))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, timestamp_ms: i64) -> anyhow::Result<String> {
        let query = format!("timestamp={}&recvWindow={}", timestamp_ms, RECV_WINDOW_MS);
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn signed_get<T: DeserializeOwned>(&self, base: &str, path: &str) -> anyhow::Result<T> {
        let query = self.signed_query(chrono::Utc::now().timestamp_millis())?;
        let url = format!("{}{}?{}", base, path, query);

        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(
                "Binance API returned {} for {}: {}",
                status,
                path,
                text.chars().take(200).collect::<String>()
            );
            return Err(anyhow::anyhow!("Binance API error: {}", status));
        }

        Ok(response.json().await?)
    }

    /// Open futures positions.
    pub async fn fetch_positions(&self) -> anyhow::Result<Vec<NewPosition>> {
        let risks: Vec<PositionRisk> = self
            .signed_get(FUTURES_API_URL, "/fapi/v2/positionRisk")
            .await?;
        let positions: Vec<_> = risks.iter().filter_map(position_from_risk).collect();
        debug!("Binance returned {} open positions", positions.len());
        Ok(positions)
    }

    /// Non-zero spot balances with USD values where a price is available.
    pub async fn fetch_balances(&self) -> anyhow::Result<Vec<NewBalance>> {
        let account: SpotAccount = self.signed_get(SPOT_API_URL, "/api/v3/account").await?;
        let mut balances = Vec::new();

        for balance in account.balances {
            let free = parse_num(&balance.free).unwrap_or(0.0);
            let locked = parse_num(&balance.locked).unwrap_or(0.0);
            let total = free + locked;
            if total <= 0.0 {
                continue;
            }

            let price = if STABLECOINS.contains(&balance.asset.as_str()) {
                None
            } else {
                match self.ticker_price(&format!("{}USDT", balance.asset)).await {
                    Ok(price) => Some(price),
                    Err(e) => {
                        debug!("No USDT price for {}: {}", balance.asset, e);
                        None
                    }
                }
            };

            balances.push(NewBalance {
                exchange: EXCHANGE.to_string(),
                usd_value: usd_value(&balance.asset, total, price),
                asset: balance.asset,
                free,
                locked,
            });
        }

        Ok(balances)
    }

    /// Last spot price of a trading pair.
    pub async fn ticker_price(&self, pair: &str) -> anyhow::Result<f64> {
        let url = format!("{}/api/v3/ticker/price", SPOT_API_URL);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", pair)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Binance ticker error: {}", response.status()));
        }

        let ticker: TickerPrice = response.json().await?;
        parse_num(&ticker.price).ok_or_else(|| anyhow::anyhow!("Invalid price for {}", pair))
    }
}
