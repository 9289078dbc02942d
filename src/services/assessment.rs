//! Rule-based market assessments.
//!
//! A run polls market context, feeds the polled values through ingestion,
//! summarizes the symbol and scores the result into a bias with a confidence.

use crate::config::AssessmentConfig;
use crate::services::database::{conversion_error, from_millis, to_millis, Database, StoreError};
use crate::services::ingest::IngestService;
use crate::services::signals::format_usd;
use crate::services::summary::SummaryService;
use crate::sources::MarketDataClient;
use crate::types::{
    Assessment, Bias, MarketContext, MarketSummary, NewAssessment, NewObservation,
    DEFAULT_TIMEFRAME,
};
use chrono::Utc;
use rusqlite::{params, Row};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Score a summary and market context into an assessment.
pub fn rule_based_assessment(summary: &MarketSummary, context: &MarketContext) -> NewAssessment {
    let mut bullish: u32 = 0;
    let mut bearish: u32 = 0;
    let mut points = Vec::new();

    if let Some(fng) = context.fear_greed {
        if fng <= 25 {
            bullish += 1;
            points.push(format!("Extreme Fear ({}) - contrarian bullish", fng));
        } else if fng >= 75 {
            bearish += 1;
            points.push(format!("Extreme Greed ({}) - contrarian bearish", fng));
        }
    }

    if let Some(funding) = context.funding_rate {
        if funding > 0.10 {
            bearish += 1;
            points.push(format!("High funding ({:.3}%) - crowded longs", funding));
        } else if funding < -0.05 {
            bullish += 1;
            points.push(format!("Negative funding ({:.3}%) - crowded shorts", funding));
        }
    }

    if let Some(long_pct) = context.long_pct {
        if long_pct > 60.0 {
            bearish += 1;
            points.push(format!("Longs at {:.0}% - potential squeeze", long_pct));
        } else if long_pct < 40.0 {
            bullish += 1;
            points.push(format!("Shorts dominant ({:.0}%) - squeeze setup", 100.0 - long_pct));
        }
    }

    if let Some(rsi) = summary.indicators.rsi_daily {
        if rsi < 30.0 {
            bullish += 1;
            points.push(format!("RSI oversold ({:.1})", rsi));
        } else if rsi > 70.0 {
            bearish += 1;
            points.push(format!("RSI overbought ({:.1})", rsi));
        }
    }

    if let (Some(price), Some(ma)) = (summary.price, summary.indicators.ma_200) {
        if price > ma {
            bullish += 1;
            points.push(format!("Price above 200 MA ({})", format_usd(ma)));
        } else if price < ma {
            bearish += 2;
            points.push(format!(
                "Price BELOW 200 MA ({}) - bearish structure",
                format_usd(ma)
            ));
        }
    }

    let bias = if bullish > bearish + 1 {
        Bias::Bullish
    } else if bearish > bullish + 1 {
        Bias::Bearish
    } else {
        Bias::Neutral
    };
    let confidence = (bullish.abs_diff(bearish) + 3).min(10);

    let observations = if points.is_empty() {
        "- No notable conditions".to_string()
    } else {
        points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let price = summary
        .price
        .map(format_usd)
        .unwrap_or_else(|| "n/a".to_string());

    let content = format!(
        "**Automated Analysis**\n\n{} at {}. Key observations:\n{}\n\nSignal count: {} bullish / {} bearish\n\n**Bias: {}** | Confidence: {}/10",
        summary.symbol, price, observations, bullish, bearish, bias, confidence
    );

    let created_at = Utc::now();
    NewAssessment {
        symbol: summary.symbol.clone(),
        title: format!(
            "{} Analysis - {}",
            summary.symbol,
            created_at.format("%Y-%m-%d %H:%M")
        ),
        content,
        bias,
        confidence: f64::from(confidence),
        sentiment: context.fear_greed_label.clone(),
        market_data: json!({
            "price": summary.price,
            "trend": summary.trend,
            "rsiDaily": summary.indicators.rsi_daily,
            "ma200": summary.indicators.ma_200,
            "context": context,
        }),
        created_at,
    }
}

/// Persisted assessments.
pub struct AssessmentLog {
    db: Arc<Database>,
}

impl AssessmentLog {
    pub fn new(db: Arc<Database>) -> Arc<Self> {
        Arc::new(Self { db })
    }

    pub fn save(&self, assessment: NewAssessment) -> Result<Assessment, StoreError> {
        let market_data = serde_json::to_string(&assessment.market_data)?;
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO market_assessments
                 (symbol, title, content, bias, confidence, sentiment, market_data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    assessment.symbol,
                    assessment.title,
                    assessment.content,
                    assessment.bias.as_str(),
                    assessment.confidence,
                    assessment.sentiment,
                    market_data,
                    to_millis(assessment.created_at),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        Ok(assessment.into_assessment(id))
    }

    /// Most recent assessments, newest first.
    pub fn recent(&self, symbol: Option<&str>, limit: usize) -> Result<Vec<Assessment>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, symbol, title, content, bias, confidence, sentiment, market_data, created_at
                 FROM market_assessments
                 WHERE (?1 IS NULL OR symbol = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![symbol, limit as i64], assessment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn assessment_from_row(row: &Row<'_>) -> rusqlite::Result<Assessment> {
    let bias: String = row.get(4)?;
    let market_data: String = row.get(7)?;
    Ok(Assessment {
        id: row.get(0)?,
        symbol: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        bias: bias.parse().map_err(|e| conversion_error(4, e))?,
        confidence: row.get(5)?,
        sentiment: row.get(6)?,
        market_data: serde_json::from_str(&market_data).map_err(|e| conversion_error(7, e))?,
        created_at: from_millis(row.get(8)?),
    })
}

/// Polled context values ingested as indicators.
fn context_observations(symbol: &str, context: &MarketContext) -> Vec<NewObservation> {
    let now = Utc::now();
    let polled = [
        ("fear_greed", context.fear_greed.map(f64::from), "alternative.me"),
        ("funding_rate", context.funding_rate, "binance"),
        ("open_interest", context.open_interest, "binance"),
        ("long_pct", context.long_pct, "binance"),
    ];

    polled
        .into_iter()
        .filter_map(|(name, value, source)| {
            value.map(|v| NewObservation {
                symbol: symbol.to_string(),
                name: name.to_string(),
                value: Some(v),
                value2: None,
                value3: None,
                timeframe: DEFAULT_TIMEFRAME.to_string(),
                source: source.to_string(),
                observed_at: now,
            })
        })
        .collect()
}

/// Runs assessments on demand and on a timer.
pub struct AssessmentService {
    ingest: Arc<IngestService>,
    summary: Arc<SummaryService>,
    log: Arc<AssessmentLog>,
    market: Option<MarketDataClient>,
    config: AssessmentConfig,
}

impl AssessmentService {
    pub fn new(
        ingest: Arc<IngestService>,
        summary: Arc<SummaryService>,
        log: Arc<AssessmentLog>,
        market: Option<MarketDataClient>,
        config: AssessmentConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ingest,
            summary,
            log,
            market,
            config,
        })
    }

    pub fn log(&self) -> &Arc<AssessmentLog> {
        &self.log
    }

    /// Assess one symbol and persist the result.
    pub async fn run(&self, symbol: &str) -> Result<Assessment, StoreError> {
        let symbol = symbol.trim().to_uppercase();

        let context = match &self.market {
            Some(client) => client.collect(&symbol).await,
            None => MarketContext::default(),
        };

        let observations = context_observations(&symbol, &context);
        if !observations.is_empty() {
            if let Err(e) = self
                .ingest
                .ingest_observations(&symbol, observations, Utc::now())
            {
                warn!("Failed to store market context for {}: {}", symbol, e);
            }
        }

        let summary = self.summary.summarize(&symbol)?;
        let assessment = self.log.save(rule_based_assessment(&summary, &context))?;
        info!(
            "Assessment for {}: {} (confidence {}/10)",
            symbol, assessment.bias, assessment.confidence
        );
        Ok(assessment)
    }

    /// Start the periodic assessment task when enabled.
    pub fn start(self: Arc<Self>) {
        if !self.config.enabled {
            info!("Periodic assessments disabled");
            return;
        }

        info!(
            "Starting periodic assessments for {:?} every {}s",
            self.config.symbols, self.config.interval_secs
        );

        tokio::spawn(async move {
            self.assessment_loop().await;
        });
    }

    async fn assessment_loop(&self) {
        let period = std::time::Duration::from_secs(self.config.interval_secs.max(1));
        let mut interval = tokio::time::interval(period);

        loop {
            interval.tick().await;
            for symbol in &self.config.symbols {
                debug!("Running scheduled assessment for {}", symbol);
                if let Err(e) = self.run(symbol).await {
                    error!("Assessment for {} failed: {}", symbol, e);
                }
            }
        }
    }
}
