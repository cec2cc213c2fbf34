//! Price bars and the validated, time-ordered series the engine runs over.

use crate::domain::error::LogicTraderError;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: i64,
    pub volume: i64,
    /// Spread in points; `None` when the source had no spread column value.
    pub spread: Option<f64>,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Named column of a bar, as referenced by `price(field=...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    TickVolume,
    Volume,
    Spread,
}

impl PriceField {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "open" => Some(PriceField::Open),
            "high" => Some(PriceField::High),
            "low" => Some(PriceField::Low),
            "close" => Some(PriceField::Close),
            "tickvol" | "tick_volume" => Some(PriceField::TickVolume),
            "vol" | "volume" => Some(PriceField::Volume),
            "spread" => Some(PriceField::Spread),
            _ => None,
        }
    }

    fn value(self, bar: &OhlcvBar) -> f64 {
        match self {
            PriceField::Open => bar.open,
            PriceField::High => bar.high,
            PriceField::Low => bar.low,
            PriceField::Close => bar.close,
            PriceField::TickVolume => bar.tick_volume as f64,
            PriceField::Volume => bar.volume as f64,
            PriceField::Spread => bar.spread.unwrap_or(f64::NAN),
        }
    }
}

/// A non-empty sequence of bars in strictly ascending time order.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    bars: Vec<OhlcvBar>,
}

impl PriceSeries {
    /// Sorts the bars by time and rejects empty input and duplicate timestamps.
    pub fn new(mut bars: Vec<OhlcvBar>) -> Result<Self, LogicTraderError> {
        if bars.is_empty() {
            return Err(LogicTraderError::InvalidPriceData {
                reason: "price series is empty".into(),
            });
        }
        bars.sort_by_key(|b| b.time);
        if let Some(pair) = bars.windows(2).find(|w| w[0].time == w[1].time) {
            return Err(LogicTraderError::InvalidPriceData {
                reason: format!("duplicate timestamp {}", pair[0].time),
            });
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> &OhlcvBar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn column(&self, field: PriceField) -> Vec<f64> {
        self.bars.iter().map(|b| field.value(b)).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.column(PriceField::Close)
    }

    /// Index of the bar stamped exactly `time`.
    pub fn position_of(&self, time: NaiveDateTime) -> Option<usize> {
        self.bars.binary_search_by_key(&time, |b| b.time).ok()
    }

    /// The prefix of the series ending at `end` (inclusive).
    pub fn window(&self, end: usize) -> PriceSeries {
        let end = end.min(self.bars.len() - 1);
        PriceSeries {
            bars: self.bars[..=end].to_vec(),
        }
    }

    /// Bars between `start` and `end` inclusive; either bound may be open.
    pub fn between(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PriceSeries, LogicTraderError> {
        let bars: Vec<OhlcvBar> = self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.time >= s) && end.is_none_or(|e| b.time <= e))
            .cloned()
            .collect();
        PriceSeries::new(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar(hour: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            time: at(hour),
            open: close,
            high: close + 0.001,
            low: close - 0.001,
            close,
            tick_volume: 120,
            volume: 0,
            spread: Some(13.0),
        }
    }

    #[test]
    fn typical_price() {
        let b = OhlcvBar {
            high: 110.0,
            low: 90.0,
            close: 105.0,
            ..bar(0, 105.0)
        };
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((b.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_dominates() {
        let b = OhlcvBar {
            high: 110.0,
            low: 90.0,
            close: 105.0,
            ..bar(0, 105.0)
        };
        assert!((b.true_range(130.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn new_sorts_bars() {
        let series = PriceSeries::new(vec![bar(3, 1.3), bar(1, 1.1), bar(2, 1.2)]).unwrap();
        assert_eq!(series.closes(), vec![1.1, 1.2, 1.3]);
    }

    #[test]
    fn new_rejects_empty() {
        let err = PriceSeries::new(Vec::new()).unwrap_err();
        assert!(matches!(err, LogicTraderError::InvalidPriceData { .. }));
    }

    #[test]
    fn new_rejects_duplicate_timestamps() {
        let err = PriceSeries::new(vec![bar(1, 1.1), bar(1, 1.2)]).unwrap_err();
        assert!(err.to_string().contains("duplicate timestamp"));
    }

    #[test]
    fn window_is_inclusive_prefix() {
        let series = PriceSeries::new(vec![bar(1, 1.1), bar(2, 1.2), bar(3, 1.3)]).unwrap();
        let w = series.window(1);
        assert_eq!(w.len(), 2);
        assert_eq!(w.last().time, at(2));
    }

    #[test]
    fn between_filters_and_fails_when_nothing_left() {
        let series = PriceSeries::new(vec![bar(1, 1.1), bar(2, 1.2), bar(3, 1.3)]).unwrap();
        let mid = series.between(Some(at(2)), None).unwrap();
        assert_eq!(mid.closes(), vec![1.2, 1.3]);
        assert!(series.between(Some(at(5)), None).is_err());
    }

    #[test]
    fn position_of_finds_exact_time() {
        let series = PriceSeries::new(vec![bar(1, 1.1), bar(2, 1.2)]).unwrap();
        assert_eq!(series.position_of(at(2)), Some(1));
        assert_eq!(series.position_of(at(7)), None);
    }

    #[test]
    fn price_field_aliases() {
        assert_eq!(PriceField::parse("Close"), Some(PriceField::Close));
        assert_eq!(PriceField::parse("TickVol"), Some(PriceField::TickVolume));
        assert_eq!(PriceField::parse("bid"), None);
    }
}
