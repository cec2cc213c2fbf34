//! Simple Moving Average.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i]). Warmup: first (n-1) values are NaN.

use crate::domain::indicator::{mean, rolling};

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, mean)
}
