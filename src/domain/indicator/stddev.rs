//! Rolling sample standard deviation (divides by n-1).
//!
//! Warmup: first (n-1) values are NaN; a period below 2 is NaN throughout.

use crate::domain::indicator::{mean, rolling};

pub fn calculate_stddev(values: &[f64], period: usize) -> Vec<f64> {
    if period < 2 {
        return vec![f64::NAN; values.len()];
    }
    rolling(values, period, |window| {
        let m = mean(window);
        let variance = window.iter().map(|v| (v - m) * (v - m)).sum::<f64>()
            / (window.len() - 1) as f64;
        variance.sqrt()
    })
}
