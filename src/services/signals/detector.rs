//! Stateful signal detector.

use super::{all_rules, Readings, Rule, RuleContext};
use crate::config::DetectorConfig;
use crate::services::database::StoreError;
use crate::services::signal_log::SignalLog;
use crate::types::{LatestIndicators, NewSignal, SignalEvent};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Full set of current indicator values for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub values: BTreeMap<String, f64>,
    /// Time of the newest value in the snapshot.
    pub as_of: DateTime<Utc>,
}

impl IndicatorSnapshot {
    pub fn new(values: BTreeMap<String, f64>, as_of: DateTime<Utc>) -> Self {
        Self { values, as_of }
    }

    /// Snapshot of primary values from the latest projection.
    pub fn from_latest(latest: &LatestIndicators) -> Self {
        Self {
            values: latest.values(),
            as_of: latest.last_updated.unwrap_or_else(Utc::now),
        }
    }
}

/// Last evaluated snapshot of a symbol.
#[derive(Debug, Clone)]
struct MemoryEntry {
    values: BTreeMap<String, f64>,
    readings: Readings,
    as_of: DateTime<Utc>,
}

type MemorySlot = Arc<Mutex<Option<MemoryEntry>>>;

/// Evaluates detection rules against the previous snapshot of each symbol.
///
/// Evaluations for one symbol are serialized on that symbol's memory slot;
/// different symbols evaluate in parallel. At most `max_tracked_symbols`
/// symbols are remembered; past that the least recently updated idle symbol
/// is forgotten and its next snapshot is treated as a first one.
pub struct SignalDetector {
    rules: Vec<Box<dyn Rule>>,
    memory: DashMap<String, MemorySlot>,
    signal_log: Arc<SignalLog>,
    config: DetectorConfig,
}

impl SignalDetector {
    pub fn new(signal_log: Arc<SignalLog>, config: DetectorConfig) -> Arc<Self> {
        Arc::new(Self {
            rules: all_rules(),
            memory: DashMap::new(),
            signal_log,
            config,
        })
    }

    fn slot(&self, symbol: &str) -> MemorySlot {
        if let Some(slot) = self.memory.get(symbol) {
            return slot.clone();
        }
        if self.memory.len() >= self.config.max_tracked_symbols {
            self.forget_oldest();
        }
        self.memory
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Forget the symbol with the oldest remembered snapshot that no
    /// evaluation currently holds.
    fn forget_oldest(&self) {
        let oldest = self
            .memory
            .iter()
            .filter(|entry| Arc::strong_count(entry.value()) == 1)
            .filter_map(|entry| {
                let as_of = entry.value().try_lock().ok()?.as_ref()?.as_of;
                Some((entry.key().clone(), as_of))
            })
            .min_by_key(|(_, as_of)| *as_of);

        if let Some((symbol, _)) = oldest {
            if self
                .memory
                .remove_if(&symbol, |_, slot| Arc::strong_count(slot) == 1)
                .is_some()
            {
                debug!("Forgot detector memory for {}", symbol);
            }
        }
    }

    /// Number of symbols with detector memory.
    pub fn tracked_symbols(&self) -> usize {
        self.memory.len()
    }

    /// Evaluate a snapshot, persist any signals and remember the snapshot.
    ///
    /// A snapshot older than the one already remembered is ignored. Fired
    /// signals are durable before this returns; if persisting fails the
    /// remembered snapshot is left unchanged.
    pub fn evaluate(
        &self,
        symbol: &str,
        snapshot: IndicatorSnapshot,
    ) -> Result<Vec<SignalEvent>, StoreError> {
        let slot = self.slot(symbol);
        let mut memory = slot.lock().map_err(|_| StoreError::Poisoned)?;

        if let Some(prev) = memory.as_ref() {
            if snapshot.as_of < prev.as_of {
                debug!(
                    "Ignoring stale snapshot for {} ({} < {})",
                    symbol, snapshot.as_of, prev.as_of
                );
                return Ok(Vec::new());
            }
        }

        let current = Readings::from_values(&snapshot.values);
        let previous = memory.as_ref().map(|m| m.readings).unwrap_or_default();
        let ctx = RuleContext {
            macd_divergence_threshold: self.config.macd_threshold_for(symbol),
        };

        let now = Utc::now();
        let drafts: Vec<NewSignal> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let draft = rule.check(&current, &previous, &ctx)?;
                debug!("Rule {} fired {} for {}", rule.id(), draft.signal_type, symbol);
                Some(NewSignal {
                    symbol: symbol.to_string(),
                    signal_type: draft.signal_type,
                    direction: draft.direction,
                    strength: draft.strength,
                    price_at_signal: current.price,
                    indicator_snapshot: snapshot.values.clone(),
                    message: draft.message,
                    created_at: now,
                })
            })
            .collect();

        let events = self.signal_log.append_all(drafts)?;
        if !events.is_empty() {
            info!("Detected {} signal(s) for {}", events.len(), symbol);
        }

        *memory = Some(MemoryEntry {
            values: snapshot.values,
            readings: current,
            as_of: snapshot.as_of,
        });

        Ok(events)
    }

    /// Timestamp of the last accepted snapshot for a symbol.
    pub fn last_snapshot_at(&self, symbol: &str) -> Option<DateTime<Utc>> {
        let slot = self.memory.get(symbol)?.clone();
        let memory = slot.lock().ok()?;
        memory.as_ref().map(|m| m.as_of)
    }

    /// Values of the last accepted snapshot for a symbol.
    pub fn last_snapshot(&self, symbol: &str) -> Option<BTreeMap<String, f64>> {
        let slot = self.memory.get(symbol)?.clone();
        let memory = slot.lock().ok()?;
        memory.as_ref().map(|m| m.values.clone())
    }
}
