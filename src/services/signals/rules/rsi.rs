//! RSI threshold rule.

use crate::services::signals::{Readings, Rule, RuleContext, SignalDraft};
use crate::types::{SignalDirection, SignalStrength, SignalType};

/// RSI zone transitions and sustained extremes.
///
/// Checked in order, first match wins:
/// - Entering oversold (previous above 30, current at or below 30)
/// - Entering overbought (previous below 70, current at or above 70)
/// - Extreme oversold (at or below 20)
/// - Extreme overbought (at or above 80)
///
/// Extremes fire on every evaluation while they hold.
pub struct RsiThresholds {
    oversold: f64,
    extreme_oversold: f64,
    overbought: f64,
    extreme_overbought: f64,
}

impl Default for RsiThresholds {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            extreme_oversold: 20.0,
            overbought: 70.0,
            extreme_overbought: 80.0,
        }
    }
}

impl Rule for RsiThresholds {
    fn id(&self) -> &str {
        "rsi"
    }

    fn check(&self, current: &Readings, previous: &Readings, _ctx: &RuleContext) -> Option<SignalDraft> {
        let rsi = current.rsi()?;
        let prev = previous.rsi();

        if prev.is_some_and(|p| p > self.oversold) && rsi <= self.oversold {
            let strength = if rsi <= self.extreme_oversold {
                SignalStrength::Strong
            } else {
                SignalStrength::Medium
            };
            return Some(SignalDraft::new(
                SignalType::RsiOversold,
                SignalDirection::Bullish,
                strength,
                format!("RSI dropped to {:.1} (oversold zone)", rsi),
            ));
        }

        if prev.is_some_and(|p| p < self.overbought) && rsi >= self.overbought {
            let strength = if rsi >= self.extreme_overbought {
                SignalStrength::Strong
            } else {
                SignalStrength::Medium
            };
            return Some(SignalDraft::new(
                SignalType::RsiOverbought,
                SignalDirection::Bearish,
                strength,
                format!("RSI rose to {:.1} (overbought zone)", rsi),
            ));
        }

        if rsi <= self.extreme_oversold {
            return Some(SignalDraft::new(
                SignalType::RsiExtremeOversold,
                SignalDirection::Bullish,
                SignalStrength::Strong,
                format!("RSI at extreme oversold: {:.1}", rsi),
            ));
        }

        if rsi >= self.extreme_overbought {
            return Some(SignalDraft::new(
                SignalType::RsiExtremeOverbought,
                SignalDirection::Bearish,
                SignalStrength::Strong,
                format!("RSI at extreme overbought: {:.1}", rsi),
            ));
        }

        None
    }
}
