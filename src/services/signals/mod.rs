//! Signal detection.
//!
//! Rules compare the current indicator readings of a symbol with the readings
//! seen on the previous evaluation and emit discrete signals on threshold
//! transitions or sustained extremes.

pub mod detector;
pub mod rules;

pub use detector::{IndicatorSnapshot, SignalDetector};
pub use rules::all_rules;

use crate::types::{IndicatorKind, SignalDirection, SignalStrength, SignalType};
use std::collections::BTreeMap;

/// Indicator values the rules interpret, keyed by [`IndicatorKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Readings {
    pub price: Option<f64>,
    pub rsi_daily: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub ma_200: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_lower: Option<f64>,
}

impl Readings {
    /// Extract known indicators from a name -> value map; other names are ignored.
    pub fn from_values(values: &BTreeMap<String, f64>) -> Self {
        let mut readings = Self::default();
        for (name, &value) in values {
            let slot = match IndicatorKind::from_name(name) {
                IndicatorKind::Price => &mut readings.price,
                IndicatorKind::RsiDaily => &mut readings.rsi_daily,
                IndicatorKind::Rsi => &mut readings.rsi,
                IndicatorKind::MacdLine => &mut readings.macd_line,
                IndicatorKind::MacdSignal => &mut readings.macd_signal,
                IndicatorKind::MacdHistogram => &mut readings.macd_histogram,
                IndicatorKind::Ma200 => &mut readings.ma_200,
                IndicatorKind::BbUpper => &mut readings.bb_upper,
                IndicatorKind::BbLower => &mut readings.bb_lower,
                IndicatorKind::Unrecognized => continue,
            };
            *slot = Some(value);
        }
        readings
    }

    /// RSI, preferring the daily reading over the generic one.
    pub fn rsi(&self) -> Option<f64> {
        self.rsi_daily.or(self.rsi)
    }
}

/// Per-symbol parameters handed to every rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleContext {
    /// Absolute MACD line/signal gap treated as a divergence.
    pub macd_divergence_threshold: f64,
}

/// A signal fired by a rule, before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDraft {
    pub signal_type: SignalType,
    pub direction: SignalDirection,
    pub strength: SignalStrength,
    pub message: String,
}

impl SignalDraft {
    pub fn new(
        signal_type: SignalType,
        direction: SignalDirection,
        strength: SignalStrength,
        message: impl Into<String>,
    ) -> Self {
        Self {
            signal_type,
            direction,
            strength,
            message: message.into(),
        }
    }
}

/// A detection rule over two consecutive readings of one symbol.
///
/// Rules are independent; each fires at most one signal per evaluation and
/// declines silently when an input it needs is missing.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule.
    fn id(&self) -> &str;

    /// Check the current readings against the previous ones.
    fn check(&self, current: &Readings, previous: &Readings, ctx: &RuleContext)
        -> Option<SignalDraft>;
}

/// Format a dollar amount with thousands separators and no decimals.
pub fn format_usd(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 2);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if rounded < 0.0 {
        format!("-${}", out)
    } else {
        format!("${}", out)
    }
}
