//! Signal detector behavior against a real signal log.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use tradewatch::config::DetectorConfig;
use tradewatch::services::{Database, IndicatorSnapshot, SignalDetector, SignalLog};
use tradewatch::types::{SignalDirection, SignalFilter, SignalStrength, SignalType};

fn detector() -> (Arc<SignalDetector>, Arc<SignalLog>) {
    let log = SignalLog::new(Arc::new(Database::open_in_memory().unwrap()));
    (SignalDetector::new(log.clone(), DetectorConfig::default()), log)
}

fn snapshot(pairs: &[(&str, f64)], as_of: DateTime<Utc>) -> IndicatorSnapshot {
    IndicatorSnapshot::new(
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        as_of,
    )
}

/// Evaluate `previous` then `current` one second apart and return the second result.
fn transition(
    previous: &[(&str, f64)],
    current: &[(&str, f64)],
) -> Vec<tradewatch::types::SignalEvent> {
    let (detector, _) = detector();
    let t0 = Utc::now() - Duration::seconds(10);
    detector
        .evaluate("BTCUSD", snapshot(previous, t0))
        .unwrap();
    detector
        .evaluate("BTCUSD", snapshot(current, t0 + Duration::seconds(1)))
        .unwrap()
}

// =============================================================================
// RSI
// =============================================================================

#[test]
fn test_rsi_entering_oversold_is_medium() {
    let events = transition(&[("rsi_1d", 35.0)], &[("rsi_1d", 28.0)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::RsiOversold);
    assert_eq!(events[0].direction, SignalDirection::Bullish);
    assert_eq!(events[0].strength, SignalStrength::Medium);
}

#[test]
fn test_rsi_entering_deep_oversold_is_single_strong_transition() {
    let events = transition(&[("rsi_1d", 35.0)], &[("rsi_1d", 15.0)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::RsiOversold);
    assert_eq!(events[0].strength, SignalStrength::Strong);
}

#[test]
fn test_rsi_sustained_extreme_fires_without_transition() {
    let events = transition(&[("rsi_1d", 18.0)], &[("rsi_1d", 15.0)]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::RsiExtremeOversold);
    assert_eq!(events[0].strength, SignalStrength::Strong);
}

#[test]
fn test_rsi_prefers_daily_over_generic() {
    let events = transition(
        &[("rsi_1d", 35.0), ("rsi", 25.0)],
        &[("rsi_1d", 28.0), ("rsi", 15.0)],
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::RsiOversold);
    assert_eq!(events[0].strength, SignalStrength::Medium);
}

// =============================================================================
// MACD / MA / Bollinger
// =============================================================================

#[test]
fn test_macd_cross_suppresses_divergence() {
    let events = transition(
        &[("macd_histogram", -2.0)],
        &[
            ("macd_line", 1_200.0),
            ("macd_signal", 100.0),
            ("macd_histogram", 1.0),
        ],
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::MacdBullishCross);
    assert_eq!(events[0].strength, SignalStrength::Medium);
}

#[test]
fn test_ma_cross_needs_previous_values() {
    let (detector, _) = detector();
    let events = detector
        .evaluate(
            "BTCUSD",
            snapshot(&[("price", 50_000.0), ("ma_200", 45_000.0)], Utc::now()),
        )
        .unwrap();
    assert!(events.is_empty());

    let events = transition(
        &[("price", 44_000.0), ("ma_200", 45_000.0)],
        &[("price", 46_000.0), ("ma_200", 45_100.0)],
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].signal_type, SignalType::Ma200BullishCross);
    assert_eq!(events[0].strength, SignalStrength::Strong);
}

#[test]
fn test_bollinger_touch_repeats_while_held() {
    let (detector, log) = detector();
    let t0 = Utc::now() - Duration::seconds(10);
    let values = [("price", 51_000.0), ("bb_upper", 50_500.0), ("bb_lower", 47_000.0)];

    for i in 0..3 {
        let events = detector
            .evaluate("BTCUSD", snapshot(&values, t0 + Duration::seconds(i)))
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].signal_type, SignalType::BbUpperTouch);
    }
    assert_eq!(log.query(&SignalFilter::default()).unwrap().len(), 3);
}

#[test]
fn test_signals_are_persisted_before_return() {
    let (detector, log) = detector();
    let t0 = Utc::now() - Duration::seconds(10);
    detector
        .evaluate("BTCUSD", snapshot(&[("rsi_1d", 75.0)], t0))
        .unwrap();
    let events = detector
        .evaluate(
            "BTCUSD",
            snapshot(&[("rsi_1d", 85.0), ("price", 60_000.0)], t0 + Duration::seconds(1)),
        )
        .unwrap();

    let stored = log.get(events[0].id).unwrap().unwrap();
    assert_eq!(stored.signal_type, SignalType::RsiExtremeOverbought);
    assert_eq!(stored.price_at_signal, Some(60_000.0));
    assert_eq!(stored.indicator_snapshot.get("rsi_1d"), Some(&85.0));
    assert!(!stored.acknowledged);
}

// =============================================================================
// Serialization per symbol
// =============================================================================

fn run_pair(newer_first: bool) -> (Vec<SignalType>, Option<BTreeMap<String, f64>>) {
    let (detector, log) = detector();
    let t0 = Utc::now() - Duration::seconds(60);
    detector
        .evaluate("BTCUSD", snapshot(&[("rsi_1d", 40.0)], t0))
        .unwrap();

    let s1 = snapshot(&[("rsi_1d", 35.0)], t0 + Duration::seconds(1));
    let s2 = snapshot(&[("rsi_1d", 28.0)], t0 + Duration::seconds(2));
    let ordered = if newer_first { [s2, s1] } else { [s1, s2] };

    for s in ordered {
        detector.evaluate("BTCUSD", s).unwrap();
    }

    let types = log
        .query(&SignalFilter::default())
        .unwrap()
        .into_iter()
        .map(|s| s.signal_type)
        .collect();
    (types, detector.last_snapshot("BTCUSD"))
}

#[test]
fn test_out_of_order_snapshots_match_chronological_result() {
    let chronological = run_pair(false);
    let reversed = run_pair(true);

    assert_eq!(chronological.0, vec![SignalType::RsiOversold]);
    assert_eq!(chronological, reversed);
    assert_eq!(
        reversed.1.unwrap().get("rsi_1d"),
        Some(&28.0),
        "stale snapshot must not overwrite memory"
    );
}

#[test]
fn test_concurrent_evaluations_for_one_symbol() {
    for _ in 0..20 {
        let (detector, log) = detector();
        let t0 = Utc::now() - Duration::seconds(60);
        detector
            .evaluate("BTCUSD", snapshot(&[("rsi_1d", 40.0)], t0))
            .unwrap();

        let s1 = snapshot(&[("rsi_1d", 35.0)], t0 + Duration::seconds(1));
        let s2 = snapshot(&[("rsi_1d", 28.0)], t0 + Duration::seconds(2));
        let barrier = Barrier::new(2);

        std::thread::scope(|scope| {
            for s in [s1, s2] {
                let detector = &detector;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    detector.evaluate("BTCUSD", s).unwrap();
                });
            }
        });

        let signals = log.query(&SignalFilter::default()).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, SignalType::RsiOversold);
        assert_eq!(
            detector.last_snapshot_at("BTCUSD"),
            Some(t0 + Duration::seconds(2))
        );
    }
}

#[test]
fn test_symbols_evaluate_independently() {
    let (detector, log) = detector();
    let t0 = Utc::now() - Duration::seconds(60);

    detector
        .evaluate("BTCUSD", snapshot(&[("rsi_1d", 35.0)], t0))
        .unwrap();
    detector
        .evaluate("ETHUSD", snapshot(&[("rsi_1d", 25.0)], t0))
        .unwrap();
    let btc = detector
        .evaluate("BTCUSD", snapshot(&[("rsi_1d", 28.0)], t0 + Duration::seconds(1)))
        .unwrap();

    assert_eq!(btc.len(), 1);
    assert!(log
        .query(&SignalFilter::for_symbol("ETHUSD", 10))
        .unwrap()
        .is_empty());
}
