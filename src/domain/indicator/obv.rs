//! OBV (On-Balance Volume) over tick volume.
//!
//! OBV[0] = 0
//! If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
//! If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
//! If close[i] == close[i-1]: OBV[i] = OBV[i-1]
//!
//! Forex exports leave the real volume column empty, so tick volume is used.

use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_obv(bars: &[OhlcvBar]) -> Vec<f64> {
    let mut values = Vec::with_capacity(bars.len());
    let mut obv = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            let prev_close = bars[i - 1].close;
            if bar.close > prev_close {
                obv += bar.tick_volume as f64;
            } else if bar.close < prev_close {
                obv -= bar.tick_volume as f64;
            }
        }
        values.push(obv);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, close: f64, tick_volume: i64) -> OhlcvBar {
        OhlcvBar {
            time: NaiveDate::from_ymd_opt(2024, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            tick_volume,
            volume: 0,
            spread: None,
        }
    }

    #[test]
    fn obv_accumulates_by_direction() {
        let bars = vec![
            make_bar(1, 10.0, 100),
            make_bar(2, 11.0, 200),
            make_bar(3, 10.5, 50),
            make_bar(4, 10.5, 70),
        ];
        assert_eq!(calculate_obv(&bars), vec![0.0, 200.0, 150.0, 150.0]);
    }
}
