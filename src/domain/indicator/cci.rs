//! Commodity Channel Index.
//!
//! CCI = (TP - SMA(TP)) / (0.015 × mean absolute deviation of TP),
//! TP = (high + low + close) / 3.

use crate::domain::indicator::{calculate_sma, mean, rolling};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 20;

pub fn calculate_cci(bars: &[OhlcvBar], period: usize) -> Vec<f64> {
    let tp: Vec<f64> = bars.iter().map(OhlcvBar::typical_price).collect();
    let sma_tp = calculate_sma(&tp, period);
    let mad = rolling(&tp, period, |window| {
        let m = mean(window);
        window.iter().map(|v| (v - m).abs()).sum::<f64>() / window.len() as f64
    });

    tp.iter()
        .zip(sma_tp.iter().zip(&mad))
        .map(|(t, (s, d))| (t - s) / (0.015 * d))
        .collect()
}
