//! Stochastic Oscillator.
//!
//! %K = 100 × (C - lowest low(k)) / (highest high(k) - lowest low(k))
//! %D = SMA(d) of %K
//! Default parameters: k_period=14, d_period=3

use crate::domain::indicator::{calculate_sma, rolling};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_K_PERIOD: usize = 14;
pub const DEFAULT_D_PERIOD: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub percent_k: Vec<f64>,
    pub percent_d: Vec<f64>,
}

pub fn calculate_stochastic(bars: &[OhlcvBar], k_period: usize, d_period: usize) -> StochasticSeries {
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();

    let low_min = rolling(&lows, k_period, |w| w.iter().copied().fold(f64::INFINITY, f64::min));
    let high_max = rolling(&highs, k_period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    });

    let percent_k: Vec<f64> = bars
        .iter()
        .zip(low_min.iter().zip(&high_max))
        .map(|(bar, (lo, hi))| 100.0 * (bar.close - lo) / (hi - lo))
        .collect();
    let percent_d = calculate_sma(&percent_k, d_period);

    StochasticSeries {
        percent_k,
        percent_d,
    }
}
