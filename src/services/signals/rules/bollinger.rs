//! Bollinger band touch rule.

use crate::services::signals::{format_usd, Readings, Rule, RuleContext, SignalDraft};
use crate::types::{SignalDirection, SignalStrength, SignalType};

/// Price at or beyond a band. Level based, fires while the condition holds.
pub struct BollingerTouch;

impl Rule for BollingerTouch {
    fn id(&self) -> &str {
        "bollinger"
    }

    fn check(&self, current: &Readings, _previous: &Readings, _ctx: &RuleContext) -> Option<SignalDraft> {
        let price = current.price?;
        let upper = current.bb_upper?;
        let lower = current.bb_lower?;

        if price >= upper {
            return Some(SignalDraft::new(
                SignalType::BbUpperTouch,
                SignalDirection::Bearish,
                SignalStrength::Weak,
                format!("Price touched upper Bollinger Band ({})", format_usd(upper)),
            ));
        }

        if price <= lower {
            return Some(SignalDraft::new(
                SignalType::BbLowerTouch,
                SignalDirection::Bullish,
                SignalStrength::Weak,
                format!("Price touched lower Bollinger Band ({})", format_usd(lower)),
            ));
        }

        None
    }
}
