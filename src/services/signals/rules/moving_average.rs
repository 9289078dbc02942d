//! 200-period moving average crossover rule.

use crate::services::signals::{format_usd, Readings, Rule, RuleContext, SignalDraft};
use crate::types::{SignalDirection, SignalStrength, SignalType};

/// Price crossing the 200 MA between two evaluations.
///
/// Needs price and MA on both sides; there is no sustained-state fallback.
pub struct Ma200Cross;

impl Rule for Ma200Cross {
    fn id(&self) -> &str {
        "ma_200"
    }

    fn check(&self, current: &Readings, previous: &Readings, _ctx: &RuleContext) -> Option<SignalDraft> {
        let price = current.price?;
        let ma = current.ma_200?;
        let prev_price = previous.price?;
        let prev_ma = previous.ma_200?;

        if prev_price < prev_ma && price > ma {
            return Some(SignalDraft::new(
                SignalType::Ma200BullishCross,
                SignalDirection::Bullish,
                SignalStrength::Strong,
                format!("Price crossed above 200 MA ({})", format_usd(ma)),
            ));
        }

        if prev_price > prev_ma && price < ma {
            return Some(SignalDraft::new(
                SignalType::Ma200BearishCross,
                SignalDirection::Bearish,
                SignalStrength::Strong,
                format!("Price crossed below 200 MA ({})", format_usd(ma)),
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

    fn at(price: f64, ma: f64) -> Readings {
        Readings {
            price: Some(price),
            ma_200: Some(ma),
            ..Default::default()
        }
    }

    #[test]
    fn test_cross_above() {
        let draft = Ma200Cross
            .check(&at(51_000.0, 50_000.0), &at(49_000.0, 50_000.0), &CTX)
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Ma200BullishCross);
        assert_eq!(draft.strength, SignalStrength::Strong);
        assert_eq!(draft.message, "Price crossed above 200 MA ($50,000)");
    }

    #[test]
    fn test_cross_below() {
        let draft = Ma200Cross
            .check(&at(49_000.0, 50_000.0), &at(51_000.0, 50_000.0), &CTX)
            .unwrap();
        assert_eq!(draft.signal_type, SignalType::Ma200BearishCross);
        assert_eq!(draft.direction, SignalDirection::Bearish);
    }

    #[test]
    fn test_requires_previous_values() {
        assert!(Ma200Cross
            .check(&at(60_000.0, 50_000.0), &Readings::default(), &CTX)
            .is_none());

        let price_only = Readings {
            price: Some(40_000.0),
            ..Default::default()
        };
        assert!(Ma200Cross
            .check(&at(60_000.0, 50_000.0), &price_only, &CTX)
            .is_none());
    }

    #[test]
    fn test_touching_the_ma_is_not_a_cross() {
        assert!(Ma200Cross
            .check(&at(50_000.0, 50_000.0), &at(49_000.0, 50_000.0), &CTX)
            .is_none());
        assert!(Ma200Cross
            .check(&at(52_000.0, 50_000.0), &at(51_000.0, 50_000.0), &CTX)
            .is_none());
    }
}
