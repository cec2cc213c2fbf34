//! Technical indicator implementations.
//!
//! Every indicator returns one value per input bar. Warm-up positions, and
//! positions whose window contains a NaN input, are `f64::NAN`; rule
//! evaluation treats any comparison against NaN as false.
//!
//! - Single-output indicators return a `Vec<f64>`
//! - Multi-output indicators return a struct of named series, flattened into
//!   [`IndicatorOutput::Multi`] at the port boundary

pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use atr::calculate_atr;
pub use bollinger::{calculate_bollinger, BollingerSeries};
pub use cci::calculate_cci;
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdSeries};
pub use obv::calculate_obv;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::{calculate_stochastic, StochasticSeries};

use std::collections::BTreeMap;

/// Result of evaluating one indicator over a price series.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutput {
    Single(Vec<f64>),
    Multi(BTreeMap<String, Vec<f64>>),
}

impl IndicatorOutput {
    /// Output names of a multi-output indicator, in sorted order.
    pub fn output_names(&self) -> Vec<&str> {
        match self {
            IndicatorOutput::Single(_) => Vec::new(),
            IndicatorOutput::Multi(map) => map.keys().map(String::as_str).collect(),
        }
    }
}

/// Apply `f` to every full window of `period` values; earlier positions are NaN.
pub(crate) fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = f(window);
    }
    out
}

pub(crate) fn mean(window: &[f64]) -> f64 {
    window.iter().sum::<f64>() / window.len() as f64
}
