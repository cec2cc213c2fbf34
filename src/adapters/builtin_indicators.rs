//! Built-in indicator library implementing IndicatorPort.
//!
//! Parameters are passed by name, e.g. `sma(period=20)` or
//! `bollinger_bands(period=30, std_dev=2)`. Parameters with a conventional
//! default may be omitted; `sma`, `ema` and `rsi` require `period`.

use std::collections::BTreeMap;

use crate::domain::error::LogicTraderError;
use crate::domain::indicator::{
    self, calculate_atr, calculate_bollinger, calculate_cci, calculate_ema, calculate_macd,
    calculate_obv, calculate_rsi, calculate_sma, calculate_stochastic, IndicatorOutput,
};
use crate::domain::ohlcv::{PriceField, PriceSeries};
use crate::domain::rule::ParamValue;
use crate::ports::indicator_port::IndicatorPort;

/// Names accepted by [`BuiltinIndicators`].
pub const INDICATOR_NAMES: [&str; 10] = [
    "price",
    "sma",
    "ema",
    "rsi",
    "macd",
    "bollinger_bands",
    "atr",
    "cci",
    "obv",
    "stochastic_oscillator",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinIndicators;

impl BuiltinIndicators {
    pub fn new() -> Self {
        Self
    }
}

/// Named parameter lookup that rejects anything the indicator does not take.
struct Params<'a> {
    indicator: &'a str,
    params: &'a [(String, ParamValue)],
}

impl<'a> Params<'a> {
    fn new(
        indicator: &'a str,
        params: &'a [(String, ParamValue)],
        accepted: &[&str],
    ) -> Result<Self, LogicTraderError> {
        if let Some((key, _)) = params.iter().find(|(k, _)| !accepted.contains(&k.as_str())) {
            return Err(LogicTraderError::InvalidIndicator {
                indicator: indicator.to_string(),
                reason: format!(
                    "unknown parameter '{}' (accepted: {})",
                    key,
                    if accepted.is_empty() {
                        "none".to_string()
                    } else {
                        accepted.join(", ")
                    }
                ),
            });
        }
        Ok(Self { indicator, params })
    }

    fn error(&self, reason: String) -> LogicTraderError {
        LogicTraderError::InvalidIndicator {
            indicator: self.indicator.to_string(),
            reason,
        }
    }

    fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn number(&self, key: &str) -> Result<Option<f64>, LogicTraderError> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Number(n)) => Ok(Some(*n)),
            Some(ParamValue::Text(t)) => {
                Err(self.error(format!("parameter '{}' must be a number, got '{}'", key, t)))
            }
        }
    }

    fn period(&self, key: &str, default: Option<usize>) -> Result<usize, LogicTraderError> {
        match self.number(key)? {
            Some(n) if n >= 1.0 && n.fract() == 0.0 => Ok(n as usize),
            Some(n) => Err(self.error(format!(
                "parameter '{}' must be a positive whole number, got {}",
                key, n
            ))),
            None => default.ok_or_else(|| self.error(format!("missing parameter '{}'", key))),
        }
    }
}

fn multi<const N: usize>(columns: [(&str, Vec<f64>); N]) -> IndicatorOutput {
    IndicatorOutput::Multi(
        columns
            .into_iter()
            .map(|(name, values)| (name.to_string(), values))
            .collect::<BTreeMap<_, _>>(),
    )
}

impl IndicatorPort for BuiltinIndicators {
    fn evaluate(
        &self,
        series: &PriceSeries,
        name: &str,
        params: &[(String, ParamValue)],
    ) -> Result<IndicatorOutput, LogicTraderError> {
        let bars = series.bars();
        let output = match name {
            "price" => {
                let p = Params::new(name, params, &["field"])?;
                let field = match p.get("field") {
                    None => PriceField::Close,
                    Some(ParamValue::Text(t)) => PriceField::parse(t)
                        .ok_or_else(|| p.error(format!("unknown price field '{}'", t)))?,
                    Some(ParamValue::Number(n)) => {
                        return Err(p.error(format!("unknown price field '{}'", n)));
                    }
                };
                IndicatorOutput::Single(series.column(field))
            }
            "sma" => {
                let p = Params::new(name, params, &["period"])?;
                IndicatorOutput::Single(calculate_sma(&series.closes(), p.period("period", None)?))
            }
            "ema" => {
                let p = Params::new(name, params, &["period"])?;
                IndicatorOutput::Single(calculate_ema(&series.closes(), p.period("period", None)?))
            }
            "rsi" => {
                let p = Params::new(name, params, &["period"])?;
                IndicatorOutput::Single(calculate_rsi(&series.closes(), p.period("period", None)?))
            }
            "macd" => {
                let p = Params::new(name, params, &["fast", "slow", "signal"])?;
                let m = calculate_macd(
                    &series.closes(),
                    p.period("fast", Some(indicator::macd::DEFAULT_FAST))?,
                    p.period("slow", Some(indicator::macd::DEFAULT_SLOW))?,
                    p.period("signal", Some(indicator::macd::DEFAULT_SIGNAL))?,
                );
                multi([
                    ("macd", m.macd),
                    ("signal", m.signal),
                    ("histogram", m.histogram),
                ])
            }
            "bollinger_bands" => {
                let p = Params::new(name, params, &["period", "std_dev"])?;
                let std_dev = p
                    .number("std_dev")?
                    .unwrap_or(indicator::bollinger::DEFAULT_STD_DEV);
                let b = calculate_bollinger(
                    &series.closes(),
                    p.period("period", Some(indicator::bollinger::DEFAULT_PERIOD))?,
                    std_dev,
                );
                multi([("upper", b.upper), ("middle", b.middle), ("lower", b.lower)])
            }
            "atr" => {
                let p = Params::new(name, params, &["period"])?;
                IndicatorOutput::Single(calculate_atr(
                    bars,
                    p.period("period", Some(indicator::atr::DEFAULT_PERIOD))?,
                ))
            }
            "cci" => {
                let p = Params::new(name, params, &["period"])?;
                IndicatorOutput::Single(calculate_cci(
                    bars,
                    p.period("period", Some(indicator::cci::DEFAULT_PERIOD))?,
                ))
            }
            "obv" => {
                Params::new(name, params, &[])?;
                IndicatorOutput::Single(calculate_obv(bars))
            }
            "stochastic_oscillator" => {
                let p = Params::new(name, params, &["k_period", "d_period"])?;
                let s = calculate_stochastic(
                    bars,
                    p.period("k_period", Some(indicator::stochastic::DEFAULT_K_PERIOD))?,
                    p.period("d_period", Some(indicator::stochastic::DEFAULT_D_PERIOD))?,
                );
                multi([("percent_k", s.percent_k), ("percent_d", s.percent_d)])
            }
            other => {
                return Err(LogicTraderError::UnknownIndicator {
                    name: other.to_string(),
                });
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;
    use chrono::{Duration, NaiveDate};

    fn series(n: usize) -> PriceSeries {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| {
                    let c = 100.0 + i as f64;
                    OhlcvBar {
                        time: t0 + Duration::hours(i as i64),
                        open: c - 0.5,
                        high: c + 1.0,
                        low: c - 1.0,
                        close: c,
                        tick_volume: 100,
                        volume: 0,
                        spread: Some(10.0),
                    }
                })
                .collect(),
        )
        .unwrap()
    }

    fn num(key: &str, v: f64) -> (String, ParamValue) {
        (key.to_string(), ParamValue::Number(v))
    }

    fn single(output: IndicatorOutput) -> Vec<f64> {
        match output {
            IndicatorOutput::Single(v) => v,
            IndicatorOutput::Multi(_) => panic!("expected single output"),
        }
    }

    #[test]
    fn price_defaults_to_close() {
        let s = series(3);
        let out = single(BuiltinIndicators.evaluate(&s, "price", &[]).unwrap());
        assert_eq!(out, vec![100.0, 101.0, 102.0]);
    }

    #[test]
    fn price_field_by_name() {
        let s = series(2);
        let params = vec![("field".to_string(), ParamValue::Text("high".into()))];
        let out = single(BuiltinIndicators.evaluate(&s, "price", &params).unwrap());
        assert_eq!(out, vec![101.0, 102.0]);
    }

    #[test]
    fn sma_with_period() {
        let s = series(4);
        let out = single(
            BuiltinIndicators
                .evaluate(&s, "sma", &[num("period", 2.0)])
                .unwrap(),
        );
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[100.5, 101.5, 102.5]);
    }

    #[test]
    fn sma_requires_period() {
        let s = series(4);
        let err = BuiltinIndicators.evaluate(&s, "sma", &[]).unwrap_err();
        assert!(matches!(err, LogicTraderError::InvalidIndicator { .. }));
    }

    #[test]
    fn fractional_period_rejected() {
        let s = series(4);
        let err = BuiltinIndicators
            .evaluate(&s, "ema", &[num("period", 2.5)])
            .unwrap_err();
        assert!(matches!(err, LogicTraderError::InvalidIndicator { .. }));
    }

    #[test]
    fn unknown_parameter_rejected() {
        let s = series(4);
        let err = BuiltinIndicators
            .evaluate(&s, "rsi", &[num("length", 14.0)])
            .unwrap_err();
        match err {
            LogicTraderError::InvalidIndicator { reason, .. } => {
                assert!(reason.contains("unknown parameter 'length'"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn multi_output_names() {
        let s = series(40);
        let macd = BuiltinIndicators.evaluate(&s, "macd", &[]).unwrap();
        assert_eq!(macd.output_names(), vec!["histogram", "macd", "signal"]);
        let bb = BuiltinIndicators
            .evaluate(&s, "bollinger_bands", &[num("period", 5.0)])
            .unwrap();
        assert_eq!(bb.output_names(), vec!["lower", "middle", "upper"]);
        let st = BuiltinIndicators
            .evaluate(&s, "stochastic_oscillator", &[])
            .unwrap();
        assert_eq!(st.output_names(), vec!["percent_d", "percent_k"]);
    }

    #[test]
    fn every_listed_name_is_known() {
        let s = series(40);
        for name in INDICATOR_NAMES {
            let params = match name {
                "sma" | "ema" | "rsi" => vec![num("period", 3.0)],
                _ => vec![],
            };
            assert!(
                BuiltinIndicators.evaluate(&s, name, &params).is_ok(),
                "{name} failed"
            );
        }
    }

    #[test]
    fn unknown_indicator() {
        let s = series(2);
        let err = BuiltinIndicators.evaluate(&s, "vwap", &[]).unwrap_err();
        assert!(matches!(err, LogicTraderError::UnknownIndicator { name } if name == "vwap"));
    }
}
