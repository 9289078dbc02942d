//! Indicator store, signal log and retention against SQLite.

use chrono::{Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tradewatch::config::RetentionConfig;
use tradewatch::services::{Database, IndicatorStore, RetentionService, SignalLog};
use tradewatch::types::{
    NewObservation, NewSignal, SignalDirection, SignalFilter, SignalStrength, SignalType,
};

fn stores() -> (Arc<Database>, Arc<IndicatorStore>, Arc<SignalLog>) {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let indicators = IndicatorStore::new(db.clone());
    let log = SignalLog::new(db.clone());
    (db, indicators, log)
}

fn signal(symbol: &str, age_days: i64) -> NewSignal {
    NewSignal {
        symbol: symbol.to_string(),
        signal_type: SignalType::RsiOversold,
        direction: SignalDirection::Bullish,
        strength: SignalStrength::Medium,
        price_at_signal: Some(48_250.0),
        indicator_snapshot: BTreeMap::from([("rsi_1d".to_string(), 28.0)]),
        message: "RSI dropped to 28.0 (oversold zone)".to_string(),
        created_at: Utc::now() - Duration::days(age_days),
    }
}

// =============================================================================
// Indicator Store
// =============================================================================

#[test]
fn test_latest_is_newest_observation_regardless_of_write_order() {
    let (_, indicators, _) = stores();
    let base = Utc::now() - Duration::hours(5);
    // Minutes offsets written out of order; the largest must win.
    let offsets = [30, 5, 120, 45, 90, 10, 60];

    for minutes in offsets {
        indicators
            .record(
                &NewObservation::new("BTCUSD", "price", 40_000.0 + minutes as f64)
                    .at(base + Duration::minutes(minutes)),
            )
            .unwrap();
    }

    let latest = indicators.latest_value("BTCUSD", "price").unwrap().unwrap();
    assert_eq!(latest.value, Some(40_120.0));
    assert_eq!(latest.updated_at, base + Duration::minutes(120));

    let history = indicators
        .history("BTCUSD", "price", Duration::hours(24))
        .unwrap();
    assert_eq!(history.len(), offsets.len());
    assert!(history.windows(2).all(|w| w[0].observed_at <= w[1].observed_at));
}

#[test]
fn test_concurrent_records_keep_newest() {
    let (_, indicators, _) = stores();
    let base = Utc::now() - Duration::hours(1);

    std::thread::scope(|scope| {
        for i in 0..8i64 {
            let indicators = &indicators;
            scope.spawn(move || {
                indicators
                    .record(
                        &NewObservation::new("BTCUSD", "rsi_1d", i as f64)
                            .at(base + Duration::seconds(i)),
                    )
                    .unwrap();
            });
        }
    });

    let latest = indicators.latest("BTCUSD").unwrap();
    assert_eq!(latest.value("rsi_1d"), Some(7.0));
    assert_eq!(latest.last_updated, Some(base + Duration::seconds(7)));
}

#[test]
fn test_latest_of_unknown_symbol_is_empty() {
    let (_, indicators, _) = stores();
    let latest = indicators.latest("NOPE").unwrap();
    assert!(latest.is_empty());
    assert!(latest.last_updated.is_none());
}

#[test]
fn test_history_window_excludes_old_points() {
    let (_, indicators, _) = stores();
    let now = Utc::now();
    for hours in [1, 30, 200] {
        indicators
            .record(&NewObservation::new("BTCUSD", "atr_14", hours as f64).at(now - Duration::hours(hours)))
            .unwrap();
    }

    let day = indicators
        .history("BTCUSD", "atr_14", Duration::hours(24))
        .unwrap();
    assert_eq!(day.len(), 1);

    let week = indicators
        .history("BTCUSD", "atr_14", Duration::hours(168))
        .unwrap();
    assert_eq!(week.len(), 2);
}

// =============================================================================
// Signal Log
// =============================================================================

#[test]
fn test_acknowledge_twice_is_harmless() {
    let (_, _, log) = stores();
    let id = log.append(&signal("BTCUSD", 0)).unwrap();

    assert!(log.acknowledge(id).unwrap());
    let first = log.get(id).unwrap().unwrap().acknowledged_at;
    assert!(log.acknowledge(id).unwrap());

    let event = log.get(id).unwrap().unwrap();
    assert!(event.acknowledged);
    assert_eq!(event.acknowledged_at, first);
}

#[test]
fn test_acknowledge_unknown_id() {
    let (_, _, log) = stores();
    assert!(!log.acknowledge(9_999).unwrap());
}

#[test]
fn test_query_filters_and_orders_newest_first() {
    let (_, _, log) = stores();
    let old = log.append(&signal("BTCUSD", 3)).unwrap();
    let new = log.append(&signal("BTCUSD", 1)).unwrap();
    log.append(&signal("ETHUSD", 2)).unwrap();
    log.acknowledge(old).unwrap();

    let btc = log.query(&SignalFilter::for_symbol("BTCUSD", 10)).unwrap();
    assert_eq!(btc.iter().map(|s| s.id).collect::<Vec<_>>(), vec![new, old]);

    let unacked = log
        .query(&SignalFilter {
            symbol: Some("BTCUSD".to_string()),
            acknowledged: Some(false),
            limit: 10,
        })
        .unwrap();
    assert_eq!(unacked.len(), 1);
    assert_eq!(unacked[0].id, new);

    let limited = log
        .query(&SignalFilter {
            limit: 2,
            ..SignalFilter::default()
        })
        .unwrap();
    assert_eq!(limited.len(), 2);
}

// =============================================================================
// Retention
// =============================================================================

#[test]
fn test_purge_keeps_unacknowledged_signals() {
    let (_, indicators, log) = stores();
    let retention = RetentionService::new(indicators.clone(), log.clone(), RetentionConfig::default());

    let unacked = log.append(&signal("BTCUSD", 400)).unwrap();
    let acked = log.append(&signal("BTCUSD", 400)).unwrap();
    log.acknowledge(acked).unwrap();

    indicators
        .record(&NewObservation::new("BTCUSD", "price", 1.0).at(Utc::now() - Duration::days(400)))
        .unwrap();

    let report = retention.purge(Duration::days(30)).unwrap();
    assert_eq!(report.signals_deleted, 1);
    assert_eq!(report.indicators_deleted, 1);

    assert!(log.get(unacked).unwrap().is_some());
    assert!(log.get(acked).unwrap().is_none());
}

#[test]
fn test_purge_leaves_latest_projection() {
    let (_, indicators, log) = stores();
    let retention = RetentionService::new(indicators.clone(), log, RetentionConfig::default());

    indicators
        .record(&NewObservation::new("BTCUSD", "ma_200", 45_000.0).at(Utc::now() - Duration::days(90)))
        .unwrap();
    retention.purge(Duration::days(30)).unwrap();

    assert!(indicators
        .history("BTCUSD", "ma_200", Duration::days(365))
        .unwrap()
        .is_empty());
    assert_eq!(
        indicators.latest("BTCUSD").unwrap().value("ma_200"),
        Some(45_000.0)
    );
}

#[test]
fn test_table_counts() {
    let (db, indicators, log) = stores();
    indicators
        .record(&NewObservation::new("BTCUSD", "price", 1.0))
        .unwrap();
    log.append(&signal("BTCUSD", 0)).unwrap();

    let counts: BTreeMap<_, _> = db.table_counts().unwrap().into_iter().collect();
    assert_eq!(counts["indicator_history"], 1);
    assert_eq!(counts["latest_indicators"], 1);
    assert_eq!(counts["trading_signals"], 1);
}
