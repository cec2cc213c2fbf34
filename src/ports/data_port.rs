//! Price data access port trait.

use crate::domain::error::LogicTraderError;
use crate::domain::ohlcv::PriceSeries;
use chrono::NaiveDateTime;

pub trait DataPort {
    /// Bars for `symbol`, restricted to `[start, end]` when the bounds are given.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PriceSeries, LogicTraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, LogicTraderError>;
}
