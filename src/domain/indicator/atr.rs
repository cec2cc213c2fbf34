//! Average True Range: rolling mean of the true range.
//!
//! The first bar has no previous close, so its true range is high - low.

use crate::domain::indicator::{mean, rolling};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_PERIOD: usize = 14;

pub(crate) fn true_ranges(bars: &[OhlcvBar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect()
}

pub fn calculate_atr(bars: &[OhlcvBar], period: usize) -> Vec<f64> {
    rolling(&true_ranges(bars), period, mean)
}
