//! Rule evaluation engine.
//!
//! Evaluates every rule of a strategy over a whole price series, producing one
//! boolean mask per rule id.
//!
//! # Evaluation Semantics
//!
//! - Operands resolve to full columns; constants broadcast to every bar
//! - `above`/`below`/`equals`: compare the two columns bar by bar
//! - `crosses_above`/`crosses_below`: require `index >= 1`, `false` at index 0
//! - Any comparison involving NaN (indicator warmup) is `false`

use std::collections::BTreeMap;

use crate::domain::error::LogicTraderError;
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::rule::{Comparator, Operand, Rule};
use crate::ports::indicator_port::IndicatorPort;

const EPSILON: f64 = 1e-9;

/// Boolean series per rule id, aligned with the price series.
pub type RuleMasks = BTreeMap<String, Vec<bool>>;

pub fn evaluate_rules(
    rules: &[Rule],
    series: &PriceSeries,
    port: &dyn IndicatorPort,
    cache: &mut IndicatorCache,
) -> Result<RuleMasks, LogicTraderError> {
    let mut masks = RuleMasks::new();
    for rule in rules {
        if masks.contains_key(&rule.id) {
            return Err(LogicTraderError::RuleInvalid {
                rule: rule.id.clone(),
                reason: "duplicate rule id".into(),
            });
        }
        let left = resolve_operand(&rule.left, series, port, cache)?;
        let right = resolve_operand(&rule.right, series, port, cache)?;
        masks.insert(rule.id.clone(), compare(rule.comparator, &left, &right));
    }
    Ok(masks)
}

fn resolve_operand(
    operand: &Operand,
    series: &PriceSeries,
    port: &dyn IndicatorPort,
    cache: &mut IndicatorCache,
) -> Result<Vec<f64>, LogicTraderError> {
    match operand {
        Operand::Constant(v) => Ok(vec![*v; series.len()]),
        Operand::Indicator(ind_ref) => Ok(cache.get_or_compute(series, ind_ref, port)?.to_vec()),
    }
}

/// Apply `comparator` bar by bar to two aligned columns.
pub fn compare(comparator: Comparator, left: &[f64], right: &[f64]) -> Vec<bool> {
    (0..left.len().min(right.len()))
        .map(|i| compare_at(comparator, left, right, i))
        .collect()
}

fn compare_at(comparator: Comparator, left: &[f64], right: &[f64], i: usize) -> bool {
    let (l, r) = (left[i], right[i]);
    match comparator {
        Comparator::Above => l > r,
        Comparator::Below => l < r,
        Comparator::Equals => (l - r).abs() < EPSILON,
        Comparator::CrossesAbove => {
            if i == 0 {
                return false;
            }
            l > r && left[i - 1] <= right[i - 1]
        }
        Comparator::CrossesBelow => {
            if i == 0 {
                return false;
            }
            l < r && left[i - 1] >= right[i - 1]
        }
    }
}
