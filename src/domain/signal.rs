//! Entry signal evaluation and conflict resolution.
//!
//! Each [`LogicEntry`] expression is evaluated into a mask over the series.
//! Per step, a signal is emitted only when exactly one entry is active;
//! zero or several active entries mean no signal at that step.

use std::collections::BTreeMap;

use crate::domain::error::InvalidExpression;
use crate::domain::logic::LogicExpression;
use crate::domain::rule_eval::RuleMasks;
use crate::domain::strategy::{Direction, LogicEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSignal {
    pub logic_id: String,
    pub direction: Direction,
    /// Stop distance in pips.
    pub stop_distance: f64,
    /// Target distance in pips.
    pub target_distance: f64,
}

impl From<&LogicEntry> for ResolvedSignal {
    fn from(entry: &LogicEntry) -> Self {
        Self {
            logic_id: entry.id.clone(),
            direction: entry.direction,
            stop_distance: entry.stop_distance,
            target_distance: entry.target_distance,
        }
    }
}

/// A logic entry that could not be evaluated and was left out.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedEntry {
    pub logic_id: String,
    pub error: InvalidExpression,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalSet {
    /// Mask per evaluated logic entry id.
    pub logic_masks: BTreeMap<String, Vec<bool>>,
    /// Resolved signal per step.
    pub signals: Vec<Option<ResolvedSignal>>,
    pub failed: Vec<FailedEntry>,
}

impl SignalSet {
    pub fn signal_at(&self, step: usize) -> Option<&ResolvedSignal> {
        self.signals.get(step).and_then(Option::as_ref)
    }

    /// Number of steps carrying a signal.
    pub fn signal_count(&self) -> usize {
        self.signals.iter().filter(|s| s.is_some()).count()
    }
}

/// Evaluate every entry against `masks` and resolve one signal per step.
///
/// An entry whose expression fails is logged and excluded; the remaining
/// entries are still evaluated.
pub fn evaluate_signals(entries: &[LogicEntry], masks: &RuleMasks, len: usize) -> SignalSet {
    let mut evaluated: Vec<(&LogicEntry, Vec<bool>)> = Vec::with_capacity(entries.len());
    let mut failed = Vec::new();

    for entry in entries {
        let mask = LogicExpression::parse(&entry.expression).and_then(|e| e.evaluate(masks));
        match mask {
            Ok(mut mask) => {
                mask.resize(len, false);
                evaluated.push((entry, mask));
            }
            Err(error) => {
                tracing::warn!(
                    logic_id = %entry.id,
                    expression = %entry.expression,
                    %error,
                    "skipping logic entry"
                );
                failed.push(FailedEntry {
                    logic_id: entry.id.clone(),
                    error,
                });
            }
        }
    }

    let signals = (0..len).map(|step| resolve_at(&evaluated, step)).collect();

    let mut logic_masks = BTreeMap::new();
    for (entry, mask) in evaluated {
        if logic_masks.insert(entry.id.clone(), mask).is_some() {
            tracing::warn!(logic_id = %entry.id, "duplicate logic entry id, audit mask overwritten");
        }
    }

    SignalSet {
        logic_masks,
        signals,
        failed,
    }
}

/// Reduce the entries active at `step` to a single signal, or none.
///
/// Each entry carries its own mask, so entries sharing an id still count
/// separately.
pub fn resolve_at(evaluated: &[(&LogicEntry, Vec<bool>)], step: usize) -> Option<ResolvedSignal> {
    let mut active = evaluated
        .iter()
        .filter(|(_, mask)| mask.get(step).copied().unwrap_or(false))
        .map(|(entry, _)| *entry);

    match (active.next(), active.next()) {
        (Some(only), None) => Some(ResolvedSignal::from(only)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, direction: Direction, expression: &str) -> LogicEntry {
        LogicEntry {
            id: id.into(),
            direction,
            expression: expression.into(),
            stop_distance: 50.0,
            target_distance: 150.0,
        }
    }

    fn masks() -> RuleMasks {
        let mut m = RuleMasks::new();
        m.insert("R1".into(), vec![true, true, false, false]);
        m.insert("R2".into(), vec![false, true, true, false]);
        m
    }

    #[test]
    fn single_active_entry_is_emitted() {
        let entries = vec![entry("L1", Direction::Long, "R1")];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert_eq!(set.signal_at(0).map(|s| s.logic_id.as_str()), Some("L1"));
        assert_eq!(set.signal_at(0).map(|s| s.stop_distance), Some(50.0));
        assert!(set.signal_at(2).is_none());
    }

    #[test]
    fn conflicting_entries_abstain() {
        let entries = vec![
            entry("L1", Direction::Long, "R1"),
            entry("L2", Direction::Short, "R2"),
        ];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert_eq!(set.signal_at(0).map(|s| s.direction), Some(Direction::Long));
        assert!(set.signal_at(1).is_none());
        assert_eq!(set.signal_at(2).map(|s| s.direction), Some(Direction::Short));
        assert!(set.signal_at(3).is_none());
        assert_eq!(set.signal_count(), 2);
    }

    #[test]
    fn same_direction_conflict_also_abstains() {
        let entries = vec![
            entry("L1", Direction::Long, "R1"),
            entry("L2", Direction::Long, "R1 | R2"),
        ];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert!(set.signal_at(0).is_none());
        assert!(set.signal_at(1).is_none());
        assert_eq!(set.signal_at(2).map(|s| s.logic_id.as_str()), Some("L2"));
    }

    #[test]
    fn bad_entry_is_skipped_others_continue() {
        let entries = vec![
            entry("L1", Direction::Long, "R1 & R9"),
            entry("L2", Direction::Short, "R2"),
            entry("L3", Direction::Short, "R2 ; rm"),
        ];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert_eq!(set.failed.len(), 2);
        assert_eq!(set.failed[0].logic_id, "L1");
        assert_eq!(set.failed[1].logic_id, "L3");
        assert!(!set.logic_masks.contains_key("L1"));
        // L1 no longer competes with L2 at step 1
        assert_eq!(set.signal_at(1).map(|s| s.logic_id.as_str()), Some("L2"));
    }

    #[test]
    fn logic_masks_kept_for_audit() {
        let entries = vec![entry("L1", Direction::Long, "R1 & R2")];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert_eq!(set.logic_masks["L1"], vec![false, true, false, false]);
    }

    #[test]
    fn shared_id_entries_keep_their_own_masks() {
        let entries = vec![
            entry("L1", Direction::Long, "R1"),
            entry("L1", Direction::Short, "R2"),
        ];
        let set = evaluate_signals(&entries, &masks(), 4);
        assert_eq!(set.signal_at(0).map(|s| s.direction), Some(Direction::Long));
        assert!(set.signal_at(1).is_none());
        assert_eq!(set.signal_at(2).map(|s| s.direction), Some(Direction::Short));
    }

    #[test]
    fn no_entries_no_signals() {
        let set = evaluate_signals(&[], &masks(), 4);
        assert_eq!(set.signals, vec![None; 4]);
    }
}
