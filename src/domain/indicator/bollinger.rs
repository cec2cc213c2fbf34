//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (std_dev × StdDev)
//! - Lower: Middle - (std_dev × StdDev)
//!
//! StdDev is the sample standard deviation (divides by n-1).
//! Default parameters: period=20, std_dev=2.0
//! Warmup: first (period-1) values are NaN.

use crate::domain::indicator::{calculate_sma, calculate_stddev};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_STD_DEV: f64 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn calculate_bollinger(closes: &[f64], period: usize, std_dev: f64) -> BollingerSeries {
    let middle = calculate_sma(closes, period);
    let sd = calculate_stddev(closes, period);

    let upper = middle.iter().zip(&sd).map(|(m, s)| m + std_dev * s).collect();
    let lower = middle.iter().zip(&sd).map(|(m, s)| m - std_dev * s).collect();

    BollingerSeries {
        upper,
        middle,
        lower,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_collapse_on_flat_prices() {
        let out = calculate_bollinger(&[10.0; 5], 3, 2.0);
        assert!(out.upper[0].is_nan());
        assert!((out.upper[4] - 10.0).abs() < f64::EPSILON);
        assert!((out.lower[4] - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bands_symmetric_around_middle() {
        let out = calculate_bollinger(&[1.0, 2.0, 3.0, 4.0], 3, 2.0);
        // window [2,3,4]: mean 3, sample sd 1
        assert!((out.middle[3] - 3.0).abs() < 1e-12);
        assert!((out.upper[3] - 5.0).abs() < 1e-12);
        assert!((out.lower[3] - 1.0).abs() < 1e-12);
    }
}
