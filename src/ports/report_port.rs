//! Report output port trait.

use std::path::Path;

use crate::domain::error::LogicTraderError;
use crate::domain::metrics::Performance;
use crate::domain::strategy::Strategy;

/// Port for writing the results of one backtest run.
pub trait ReportPort {
    /// Write the report for `performance` into `output_dir`, creating it if needed.
    fn write(
        &self,
        performance: &Performance,
        strategy: &Strategy,
        output_dir: &Path,
    ) -> Result<(), LogicTraderError>;
}
