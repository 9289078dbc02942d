//! Market summary read model.

use crate::services::database::{Database, StoreError};
use crate::services::indicator_store::load_latest;
use crate::services::position_store::load_positions;
use crate::services::signal_log::query_signals;
use crate::types::{
    BollingerReading, KeyIndicators, LatestIndicators, MacdReading, MarketSummary, SignalFilter,
    Trend,
};
use chrono::Utc;
use std::sync::Arc;

/// Recent signals included in a summary.
pub const SUMMARY_SIGNAL_LIMIT: usize = 5;

/// Composes latest indicators, recent signals and open positions.
pub struct SummaryService {
    db: Arc<Database>,
}

impl SummaryService {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    /// Summarize one symbol.
    ///
    /// All reads share one connection guard so the parts are consistent with
    /// each other. Missing data yields empty parts, never an error.
    pub fn summarize(&self, symbol: &str) -> Result<MarketSummary, StoreError> {
        let (latest, recent_signals, positions) = self.db.with_conn(|conn| {
            let latest = load_latest(conn, symbol)?;
            let signals =
                query_signals(conn, &SignalFilter::for_symbol(symbol, SUMMARY_SIGNAL_LIMIT))?;
            let positions = load_positions(conn, None)?;
            Ok((latest, signals, positions))
        })?;

        let price = latest.value("price");
        let indicators = key_indicators(&latest);
        let trend = Trend::from_price(price, indicators.ma_200);
        let total_unrealized_pnl = positions.iter().filter_map(|p| p.unrealized_pnl).sum();

        Ok(MarketSummary {
            generated_at: Utc::now(),
            symbol: symbol.to_string(),
            price,
            trend,
            indicators,
            recent_signals,
            positions,
            total_unrealized_pnl,
            data_freshness: latest.last_updated,
        })
    }
}

fn key_indicators(latest: &LatestIndicators) -> KeyIndicators {
    let price = latest.value("price");
    let ma_200 = latest.value("ma_200");

    KeyIndicators {
        rsi_daily: latest.value("rsi_1d").or_else(|| latest.value("rsi")),
        rsi_4h: latest.value("rsi_4h"),
        macd: MacdReading {
            line: latest.value("macd_line"),
            signal: latest.value("macd_signal"),
            histogram: latest.value("macd_histogram"),
        },
        ma_200,
        above_200ma: price.zip(ma_200).map(|(p, ma)| p > ma),
        atr: latest.value("atr_14"),
        volume_ratio: latest.value("volume_ratio"),
        bollinger: BollingerReading {
            upper: latest.value("bb_upper"),
            lower: latest.value("bb_lower"),
        },
    }
}
