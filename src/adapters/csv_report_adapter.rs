//! CSV report adapter implementing ReportPort.
//!
//! Writes three files into the output directory:
//! - `trades.csv`: the closed-trade ledger, unrounded
//! - `equity.csv`: balance after every bar
//! - `summary.csv`: headline metrics, rounded for reading

use std::fs;
use std::path::Path;

use crate::domain::error::LogicTraderError;
use crate::domain::metrics::Performance;
use crate::domain::strategy::Strategy;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

const TRADE_HEADER: [&str; 16] = [
    "id",
    "logic_id",
    "direction",
    "entry_time",
    "entry_price",
    "exit_time",
    "exit_price",
    "exit_reason",
    "stop_distance",
    "target_distance",
    "pnl",
    "duration_minutes",
    "return_pct",
    "max_favorable",
    "max_adverse",
    "risk_reward_ratio",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn report_error(path: &Path, e: impl std::fmt::Display) -> LogicTraderError {
    LogicTraderError::Report {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

fn write_rows<I>(path: &Path, header: &[&str], rows: I) -> Result<(), LogicTraderError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_path(path).map_err(|e| report_error(path, e))?;
    writer
        .write_record(header)
        .map_err(|e| report_error(path, e))?;
    for row in rows {
        writer.write_record(&row).map_err(|e| report_error(path, e))?;
    }
    writer.flush().map_err(|e| report_error(path, e))
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        performance: &Performance,
        strategy: &Strategy,
        output_dir: &Path,
    ) -> Result<(), LogicTraderError> {
        fs::create_dir_all(output_dir).map_err(|e| report_error(output_dir, e))?;

        let trades = performance.trades.iter().map(|t| {
            vec![
                t.id.to_string(),
                t.logic_id.clone(),
                t.direction.to_string(),
                t.entry_time.to_string(),
                t.entry_price.to_string(),
                t.exit_time.to_string(),
                t.exit_price.to_string(),
                t.exit_reason
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                t.stop_distance.to_string(),
                t.target_distance.to_string(),
                t.pnl.to_string(),
                t.duration.num_minutes().to_string(),
                t.return_pct.to_string(),
                t.max_favorable.to_string(),
                t.max_adverse.to_string(),
                t.risk_reward_ratio
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
            ]
        });
        write_rows(&output_dir.join(TRADES_FILE), &TRADE_HEADER, trades)?;

        let equity = performance
            .equity_curve
            .iter()
            .map(|p| vec![p.time.to_string(), p.balance.to_string()]);
        write_rows(&output_dir.join(EQUITY_FILE), &["time", "balance"], equity)?;

        let m = &performance.metrics;
        let summary = [
            ("strategy", strategy.name.clone()),
            ("total_trades", m.total_trades.to_string()),
            ("wins", m.wins.to_string()),
            ("losses", m.losses.to_string()),
            ("win_rate_pct", format!("{:.2}", m.win_rate * 100.0)),
            ("total_profit", format!("{:.2}", m.total_profit)),
            ("avg_win", format!("{:.2}", m.avg_win)),
            ("avg_loss", format!("{:.2}", m.avg_loss)),
            ("final_balance", format!("{:.2}", m.final_balance)),
            ("avg_risk_reward", format!("{:.2}", m.avg_risk_reward)),
        ]
        .into_iter()
        .map(|(k, v)| vec![k.to_string(), v]);
        write_rows(&output_dir.join(SUMMARY_FILE), &["metric", "value"], summary)?;

        tracing::info!(dir = %output_dir.display(), trades = performance.trades.len(), "report written");
        Ok(())
    }
}
