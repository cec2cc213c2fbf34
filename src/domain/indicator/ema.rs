//! Exponential Moving Average.
//!
//! alpha = 2/(n+1), seeded with the first available value, then
//! EMA[i] = C[i]*alpha + EMA[i-1]*(1-alpha). There is no warmup: the seed
//! bar already carries a value. Leading NaN inputs stay NaN.

pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;

    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        let ema = match prev {
            None => value,
            Some(p) => value * alpha + p * (1.0 - alpha),
        };
        out[i] = ema;
        prev = Some(ema);
    }
    out
}
