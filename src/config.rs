use std::collections::HashMap;
use std::env;
use tracing::warn;

use crate::types::DEFAULT_SYMBOL;

/// Default MACD line/signal gap treated as a divergence.
pub const DEFAULT_MACD_DIVERGENCE_THRESHOLD: f64 = 500.0;

/// Default cap on symbols whose last snapshot the detector remembers.
pub const DEFAULT_MAX_TRACKED_SYMBOLS: usize = 10_000;

/// Longest accepted retention window in days.
pub const MAX_RETENTION_DAYS: u32 = 365;

/// Signal detector configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Absolute MACD line/signal gap that counts as a divergence.
    pub macd_divergence_threshold: f64,
    /// Per-symbol overrides of the divergence threshold (keys upper-case).
    pub macd_divergence_overrides: HashMap<String, f64>,
    /// Remembered symbols before the least recently updated one is forgotten.
    pub max_tracked_symbols: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            macd_divergence_threshold: DEFAULT_MACD_DIVERGENCE_THRESHOLD,
            macd_divergence_overrides: HashMap::new(),
            max_tracked_symbols: DEFAULT_MAX_TRACKED_SYMBOLS,
        }
    }
}

impl DetectorConfig {
    /// Divergence threshold for a symbol, falling back to the global value.
    pub fn macd_threshold_for(&self, symbol: &str) -> f64 {
        self.macd_divergence_overrides
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(self.macd_divergence_threshold)
    }
}

/// Data retention configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Enable the periodic cleanup task.
    pub auto_cleanup_enabled: bool,
    /// Age in days after which history and acknowledged signals are purged
    /// (1 to [`MAX_RETENTION_DAYS`]).
    pub retention_days: u32,
    /// Interval between automatic cleanups in seconds.
    pub cleanup_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            auto_cleanup_enabled: true,
            retention_days: 30,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Periodic market assessment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Symbols assessed on each run.
    pub symbols: Vec<String>,
    /// Poll public market-data APIs before assessing.
    pub fetch_market_data: bool,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            symbols: vec![DEFAULT_SYMBOL.to_string()],
            fetch_market_data: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Shared secret expected in webhook payloads (unchecked when unset).
    pub webhook_secret: Option<String>,
    /// Symbol used by endpoints that don't name one.
    pub default_symbol: String,
    /// Binance API key for account polling.
    pub binance_api_key: Option<String>,
    /// Binance API secret.
    pub binance_api_secret: Option<String>,
    pub detector: DetectorConfig,
    pub retention: RetentionConfig,
    pub assessment: AssessmentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "trading_data.db".to_string(),
            webhook_secret: None,
            default_symbol: DEFAULT_SYMBOL.to_string(),
            binance_api_key: None,
            binance_api_secret: None,
            detector: DetectorConfig::default(),
            retention: RetentionConfig::default(),
            assessment: AssessmentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let default_symbol = env::var("DEFAULT_SYMBOL")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.default_symbol);

        let assessment_symbols = env::var("ASSESSMENT_SYMBOLS")
            .ok()
            .map(|s| parse_symbol_list(&s))
            .filter(|symbols| !symbols.is_empty())
            .unwrap_or_else(|| vec![default_symbol.clone()]);

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            default_symbol,
            binance_api_key: env::var("BINANCE_API_KEY").ok().filter(|s| !s.is_empty()),
            binance_api_secret: env::var("BINANCE_API_SECRET").ok().filter(|s| !s.is_empty()),
            detector: DetectorConfig {
                macd_divergence_threshold: env::var("MACD_DIVERGENCE_THRESHOLD")
                    .ok()
                    .and_then(|v| {
                        let parsed = parse_threshold(&v);
                        if parsed.is_none() {
                            warn!("Ignoring invalid MACD_DIVERGENCE_THRESHOLD {:?}", v);
                        }
                        parsed
                    })
                    .unwrap_or(DEFAULT_MACD_DIVERGENCE_THRESHOLD),
                macd_divergence_overrides: env::var("MACD_DIVERGENCE_THRESHOLDS")
                    .ok()
                    .map(|s| parse_threshold_overrides(&s))
                    .unwrap_or_default(),
                max_tracked_symbols: env::var("MAX_TRACKED_SYMBOLS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n: &usize| *n > 0)
                    .unwrap_or(DEFAULT_MAX_TRACKED_SYMBOLS),
            },
            retention: RetentionConfig {
                auto_cleanup_enabled: env::var("AUTO_CLEANUP")
                    .ok()
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.retention.auto_cleanup_enabled),
                retention_days: env::var("RETENTION_DAYS")
                    .ok()
                    .and_then(|v| {
                        let parsed = parse_retention_days(&v);
                        if parsed.is_none() {
                            warn!(
                                "Ignoring RETENTION_DAYS {:?}: expected 1-{}",
                                v, MAX_RETENTION_DAYS
                            );
                        }
                        parsed
                    })
                    .unwrap_or(defaults.retention.retention_days),
                cleanup_interval_secs: env::var("CLEANUP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.retention.cleanup_interval_secs),
            },
            assessment: AssessmentConfig {
                enabled: env::var("ASSESSMENT_ENABLED")
                    .ok()
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.assessment.enabled),
                interval_secs: env::var("ASSESSMENT_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.assessment.interval_secs),
                symbols: assessment_symbols,
                fetch_market_data: env::var("MARKET_DATA_ENABLED")
                    .ok()
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.assessment.fetch_market_data),
            },
        }
    }

    /// Binance key and secret, when both are set.
    pub fn binance_credentials(&self) -> Option<(&str, &str)> {
        match (&self.binance_api_key, &self.binance_api_secret) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Parse "BTCUSD, ethusd" into upper-case symbols.
fn parse_symbol_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Retention days within 1..=MAX_RETENTION_DAYS.
fn parse_retention_days(value: &str) -> Option<u32> {
    value
        .trim()
        .parse()
        .ok()
        .filter(|days| (1..=MAX_RETENTION_DAYS).contains(days))
}

/// A finite, non-negative divergence threshold.
fn parse_threshold(value: &str) -> Option<f64> {
    let threshold: f64 = value.trim().parse().ok()?;
    (threshold.is_finite() && threshold >= 0.0).then_some(threshold)
}

/// Parse "BTCUSD=500,ETHUSD=25" into per-symbol thresholds, skipping malformed entries.
fn parse_threshold_overrides(value: &str) -> HashMap<String, f64> {
    value
        .split(',')
        .filter_map(|entry| {
            let (symbol, threshold) = entry.split_once('=')?;
            let symbol = symbol.trim().to_uppercase();
            if symbol.is_empty() {
                return None;
            }
            Some((symbol, parse_threshold(threshold)?))
        })
        .collect()
}
