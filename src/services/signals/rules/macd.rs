//! MACD histogram cross and line/signal divergence rule.

use crate::services::signals::{Readings, Rule, RuleContext, SignalDraft};
use crate::types::{SignalDirection, SignalStrength, SignalType};

/// Histogram zero crosses, falling back to a wide line/signal gap.
pub struct MacdCross;

impl Rule for MacdCross {
    fn id(&self) -> &str {
        "macd"
    }

    fn check(&self, current: &Readings, previous: &Readings, ctx: &RuleContext) -> Option<SignalDraft> {
        let histogram = current.macd_histogram?;

        if let Some(prev) = previous.macd_histogram {
            if prev < 0.0 && histogram >= 0.0 {
                return Some(SignalDraft::new(
                    SignalType::MacdBullishCross,
                    SignalDirection::Bullish,
                    SignalStrength::Medium,
                    "MACD histogram crossed above zero",
                ));
            }
            if prev > 0.0 && histogram <= 0.0 {
                return Some(SignalDraft::new(
                    SignalType::MacdBearishCross,
                    SignalDirection::Bearish,
                    SignalStrength::Medium,
                    "MACD histogram crossed below zero",
                ));
            }
        }

        let diff = current.macd_line? - current.macd_signal?;
        if diff.abs() > ctx.macd_divergence_threshold {
            let direction = if diff > 0.0 {
                SignalDirection::Bullish
            } else {
                SignalDirection::Bearish
            };
            return Some(SignalDraft::new(
                SignalType::MacdDivergence,
                direction,
                SignalStrength::Weak,
                format!(
                    "MACD shows strong {} divergence",
                    direction.as_str().to_lowercase()
                ),
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: RuleContext = RuleContext {
        macd_divergence_threshold: 500.0,
    };

    fn macd(line: f64, signal: f64, histogram: f64) -> Readings {
        Readings {
            macd_line: Some(line),
            macd_signal: Some(signal),
            macd_histogram: Some(histogram),
            ..Default::default()
        }
    }

    #[test]
    fn test_bullish_cross_beats_divergence() {
        let prev = macd(0.0, 0.0, -2.0);
        // Gap of 900 would be a divergence on its own.
        let cur = macd(1_000.0, 100.0, 1.0);

        let draft = MacdCross.check(&cur, &prev, &CTX).unwrap();
        assert_eq!(draft.signal_type, SignalType::MacdBullishCross);
        assert_eq!(draft.direction, SignalDirection::Bullish);
        assert_eq!(draft.strength, SignalStrength::Medium);
    }

    #[test]
    fn test_cross_to_exact_zero() {
        let up = MacdCross
            .check(&macd(0.0, 0.0, 0.0), &macd(0.0, 0.0, -1.0), &CTX)
            .unwrap();
        assert_eq!(up.signal_type, SignalType::MacdBullishCross);

        let down = MacdCross
            .check(&macd(0.0, 0.0, 0.0), &macd(0.0, 0.0, 1.0), &CTX)
            .unwrap();
        assert_eq!(down.signal_type, SignalType::MacdBearishCross);
    }

    #[test]
    fn test_zero_to_zero_is_quiet() {
        assert!(MacdCross
            .check(&macd(0.0, 0.0, 0.0), &macd(0.0, 0.0, 0.0), &CTX)
            .is_none());
    }

    #[test]
    fn test_divergence_direction_follows_gap() {
        let prev = macd(0.0, 0.0, 5.0);

        let bearish = MacdCross
            .check(&macd(-200.0, 400.0, 3.0), &prev, &CTX)
            .unwrap();
        assert_eq!(bearish.signal_type, SignalType::MacdDivergence);
        assert_eq!(bearish.direction, SignalDirection::Bearish);
        assert_eq!(bearish.strength, SignalStrength::Weak);
        assert_eq!(bearish.message, "MACD shows strong bearish divergence");

        assert!(MacdCross
            .check(&macd(400.0, 0.0, 3.0), &prev, &CTX)
            .is_none());
    }

    #[test]
    fn test_divergence_threshold_is_configurable() {
        let ctx = RuleContext {
            macd_divergence_threshold: 10.0,
        };
        let draft = MacdCross
            .check(&macd(30.0, 5.0, 2.0), &Readings::default(), &ctx)
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::MacdDivergence);
        assert_eq!(draft.direction, SignalDirection::Bullish);
    }

    #[test]
    fn test_missing_histogram_declines() {
        let cur = Readings {
            macd_line: Some(2_000.0),
            macd_signal: Some(0.0),
            ..Default::default()
        };
        assert!(MacdCross.check(&cur, &Readings::default(), &CTX).is_none());
    }
}
