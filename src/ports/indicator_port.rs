//! Indicator computation port trait.

use crate::domain::error::LogicTraderError;
use crate::domain::indicator::IndicatorOutput;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::rule::ParamValue;

/// Computes a named indicator over a whole price series.
///
/// Implementations must be pure functions of `series`, `name` and `params`,
/// and must only look backwards: the value at index `i` may depend on bars
/// `0..=i` alone.
pub trait IndicatorPort {
    fn evaluate(
        &self,
        series: &PriceSeries,
        name: &str,
        params: &[(String, ParamValue)],
    ) -> Result<IndicatorOutput, LogicTraderError>;
}
