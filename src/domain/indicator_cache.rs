//! Per-run memo table of computed indicator columns.

use std::collections::BTreeMap;

use crate::domain::error::LogicTraderError;
use crate::domain::indicator::IndicatorOutput;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::rule::IndicatorRef;
use crate::ports::indicator_port::IndicatorPort;

/// Indicator columns keyed by [`IndicatorRef::column_name`].
///
/// One cache belongs to one evaluation of one price series; it must not be
/// reused across series.
#[derive(Debug, Default)]
pub struct IndicatorCache {
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn columns(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.columns
    }

    /// Return the cached column for `indicator`, computing it on first use.
    pub fn get_or_compute(
        &mut self,
        series: &PriceSeries,
        indicator: &IndicatorRef,
        port: &dyn IndicatorPort,
    ) -> Result<&[f64], LogicTraderError> {
        let key = indicator.column_name();
        if !self.columns.contains_key(&key) {
            let column = select_output(
                indicator,
                port.evaluate(series, &indicator.name, &indicator.params)?,
            )?;
            if column.len() != series.len() {
                return Err(LogicTraderError::InvalidIndicator {
                    indicator: indicator.to_string(),
                    reason: format!(
                        "produced {} values for {} bars",
                        column.len(),
                        series.len()
                    ),
                });
            }
            tracing::debug!(column = %key, "computed indicator column");
            self.columns.insert(key.clone(), column);
        }
        Ok(self.columns[&key].as_slice())
    }
}

fn select_output(
    indicator: &IndicatorRef,
    output: IndicatorOutput,
) -> Result<Vec<f64>, LogicTraderError> {
    match (output, &indicator.output) {
        (IndicatorOutput::Single(values), None) => Ok(values),
        (IndicatorOutput::Single(_), Some(name)) => Err(LogicTraderError::InvalidIndicator {
            indicator: indicator.to_string(),
            reason: format!("has a single output, cannot select '{}'", name),
        }),
        (IndicatorOutput::Multi(map), None) => Err(LogicTraderError::InvalidIndicator {
            indicator: indicator.to_string(),
            reason: format!(
                "has several outputs, select one of: {}",
                map.keys().cloned().collect::<Vec<_>>().join(", ")
            ),
        }),
        (IndicatorOutput::Multi(mut map), Some(name)) => {
            let available = map.keys().cloned().collect::<Vec<_>>().join(", ");
            map.remove(name.as_str())
                .ok_or_else(|| LogicTraderError::InvalidIndicator {
                    indicator: indicator.to_string(),
                    reason: format!("unknown output '{}' (available: {})", name, available),
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use crate::domain::rule::ParamValue;
    use chrono::NaiveDate;
    use std::cell::Cell;

    struct CountingPort {
        calls: Cell<usize>,
    }

    impl IndicatorPort for CountingPort {
        fn evaluate(
            &self,
            series: &PriceSeries,
            name: &str,
            _params: &[(String, ParamValue)],
        ) -> Result<IndicatorOutput, LogicTraderError> {
            self.calls.set(self.calls.get() + 1);
            match name {
                "flat" => Ok(IndicatorOutput::Single(vec![1.0; series.len()])),
                "bands" => {
                    let mut map = BTreeMap::new();
                    map.insert("upper".to_string(), vec![2.0; series.len()]);
                    map.insert("lower".to_string(), vec![0.0; series.len()]);
                    Ok(IndicatorOutput::Multi(map))
                }
                "short" => Ok(IndicatorOutput::Single(vec![1.0])),
                other => Err(LogicTraderError::UnknownIndicator {
                    name: other.to_string(),
                }),
            }
        }
    }

    fn series() -> PriceSeries {
        let bars = (0..3)
            .map(|i| OhlcvBar {
                time: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(i, 0, 0)
                    .unwrap(),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                tick_volume: 0,
                volume: 0,
                spread: None,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    fn reference(name: &str, output: Option<&str>) -> IndicatorRef {
        IndicatorRef {
            name: name.into(),
            params: vec![("period".into(), ParamValue::Number(5.0))],
            output: output.map(String::from),
        }
    }

    #[test]
    fn repeated_reference_computes_once() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        let s = series();
        let r = reference("flat", None);
        cache.get_or_compute(&s, &r, &port).unwrap();
        cache.get_or_compute(&s, &r, &port).unwrap();
        assert_eq!(port.calls.get(), 1);
        assert!(cache.contains("flat_5"));
    }

    #[test]
    fn selects_named_output() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        let col = cache
            .get_or_compute(&series(), &reference("bands", Some("upper")), &port)
            .unwrap()
            .to_vec();
        assert_eq!(col, vec![2.0; 3]);
        assert!(cache.contains("bands_upper_5"));
    }

    #[test]
    fn multi_output_requires_selector() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        let err = cache
            .get_or_compute(&series(), &reference("bands", None), &port)
            .unwrap_err();
        assert!(err.to_string().contains("lower, upper"));
    }

    #[test]
    fn unknown_output_lists_available() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        let err = cache
            .get_or_compute(&series(), &reference("bands", Some("middle")), &port)
            .unwrap_err();
        assert!(err.to_string().contains("unknown output 'middle'"));
    }

    #[test]
    fn single_output_rejects_selector() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        assert!(cache
            .get_or_compute(&series(), &reference("flat", Some("upper")), &port)
            .is_err());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let port = CountingPort {
            calls: Cell::new(0),
        };
        let mut cache = IndicatorCache::new();
        let err = cache
            .get_or_compute(&series(), &reference("short", None), &port)
            .unwrap_err();
        assert!(err.to_string().contains("1 values for 3 bars"));
        assert!(cache.is_empty());
    }
}
