//! RSI (Relative Strength Index) over simple rolling averages.
//!
//! gain/loss are the positive/negative close-to-close changes (0 on the
//! first bar), averaged with a plain rolling mean of n values.
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! avg_loss == 0 with gains gives 100; a flat window gives NaN.

use crate::domain::indicator::{mean, rolling};

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let change = if i == 0 { 0.0 } else { closes[i] - closes[i - 1] };
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let avg_gain = rolling(&gains, period, mean);
    let avg_loss = rolling(&losses, period, mean);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| 100.0 - 100.0 / (1.0 + g / l))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_all_gains_is_100() {
        let out = calculate_rsi(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[1].is_nan());
        assert!((out[4] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_balanced_moves_is_50() {
        let out = calculate_rsi(&[10.0, 11.0, 10.0, 11.0, 10.0], 2);
        assert!((out[2] - 50.0).abs() < 1e-9);
        assert!((out[4] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_window_is_nan() {
        let out = calculate_rsi(&[3.0, 3.0, 3.0, 3.0], 2);
        assert!(out[3].is_nan());
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let out = calculate_rsi(&[5.0, 4.0, 3.0, 2.0], 3);
        assert!(out[3].abs() < 1e-9);
    }
}
