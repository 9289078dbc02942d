//! Detection rule implementations.

pub mod bollinger;
pub mod macd;
pub mod moving_average;
pub mod rsi;

pub use bollinger::BollingerTouch;
pub use macd::MacdCross;
pub use moving_average::Ma200Cross;
pub use rsi::RsiThresholds;

use super::Rule;

/// Get all detection rules in evaluation order.
pub fn all_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(RsiThresholds::default()),
        Box::new(MacdCross),
        Box::new(Ma200Cross),
        Box::new(BollingerTouch),
    ]
}
