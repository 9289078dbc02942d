use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseLabelError;

/// Side of an exchange position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Side implied by a signed position amount.
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Short
        } else {
            Self::Long
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PositionSide {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LONG" => Ok(Self::Long),
            "SHORT" => Ok(Self::Short),
            other => Err(ParseLabelError {
                kind: "position side",
                value: other.to_string(),
            }),
        }
    }
}

/// Open position reported by an exchange connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub exchange: String,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: Option<f64>,
    pub current_price: Option<f64>,
    /// quantity * current_price when a price is known.
    pub notional_value: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub leverage: f64,
    pub margin_mode: Option<String>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Position data as produced by a connector, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
    pub exchange: String,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: Option<f64>,
    pub current_price: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub leverage: f64,
    pub margin_mode: Option<String>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl NewPosition {
    pub fn new(exchange: &str, symbol: &str, side: PositionSide, quantity: f64) -> Self {
        Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            side,
            quantity,
            entry_price: None,
            current_price: None,
            unrealized_pnl: None,
            leverage: 1.0,
            margin_mode: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn notional_value(&self) -> Option<f64> {
        self.current_price.map(|p| self.quantity * p)
    }
}

/// Exchange asset balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub exchange: String,
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub total: f64,
    pub usd_value: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Balance data as produced by a connector.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBalance {
    pub exchange: String,
    pub asset: String,
    pub free: f64,
    pub locked: f64,
    pub usd_value: Option<f64>,
}

/// Total value across all exchanges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioValue {
    pub total_balance_value: f64,
    pub total_position_value: f64,
    pub total_unrealized_pnl: f64,
    pub total_value: f64,
}

impl PortfolioValue {
    pub fn from_holdings(balances: &[Balance], positions: &[Position]) -> Self {
        let total_balance_value: f64 = balances.iter().filter_map(|b| b.usd_value).sum();
        let total_position_value: f64 = positions.iter().filter_map(|p| p.notional_value).sum();
        let total_unrealized_pnl: f64 = positions.iter().filter_map(|p| p.unrealized_pnl).sum();

        Self {
            total_balance_value,
            total_position_value,
            total_unrealized_pnl,
            total_value: total_balance_value + total_position_value,
        }
    }
}
