//! CSV price data adapter for MetaTrader exports.
//!
//! One file per symbol, `{data_dir}/{symbol}.csv`, with a header line and the
//! columns `Date Time Open High Low Close TickVol Vol Spread`. Files exported
//! from the terminal are tab separated; comma separated files are accepted
//! too. The spread column may be missing.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::error::LogicTraderError;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::ports::data_port::DataPort;

const DATE_FORMATS: [&str; 2] = ["%Y.%m.%d", "%Y-%m-%d"];
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(date.trim(), f).ok())?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(time.trim(), f).ok())?;
    Some(date.and_time(time))
}

fn column<T: FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<T, LogicTraderError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| LogicTraderError::InvalidPriceData {
            reason: format!("line {}: missing {} column", line, name),
        })?;
    raw.trim()
        .parse()
        .map_err(|_| LogicTraderError::InvalidPriceData {
            reason: format!("line {}: invalid {} value '{}'", line, name, raw.trim()),
        })
}

fn parse_bars(content: &str) -> Result<Vec<OhlcvBar>, LogicTraderError> {
    let header = content.lines().next().unwrap_or_default();
    let delimiter = if header.contains('\t') { b'\t' } else { b',' };

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut bars = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| LogicTraderError::InvalidPriceData {
            reason: format!("CSV parse error: {}", e),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        let date: String = column(&record, 0, "date", line)?;
        let time: String = column(&record, 1, "time", line)?;
        let time = parse_timestamp(&date, &time).ok_or_else(|| {
            LogicTraderError::InvalidPriceData {
                reason: format!("line {}: invalid timestamp '{} {}'", line, date, time),
            }
        })?;

        let spread = match record.get(8).map(str::trim) {
            None | Some("") => None,
            Some(_) => Some(column::<f64>(&record, 8, "spread", line)?),
        };

        bars.push(OhlcvBar {
            time,
            open: column(&record, 2, "open", line)?,
            high: column(&record, 3, "high", line)?,
            low: column(&record, 4, "low", line)?,
            close: column(&record, 5, "close", line)?,
            tick_volume: column(&record, 6, "tick volume", line)?,
            volume: column(&record, 7, "volume", line)?,
            spread,
        });
    }
    Ok(bars)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<PriceSeries, LogicTraderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LogicTraderError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let bars: Vec<OhlcvBar> = parse_bars(&content)?
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.time >= s) && end.is_none_or(|e| b.time <= e))
            .collect();

        if bars.is_empty() {
            return Err(LogicTraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        tracing::debug!(symbol, bars = bars.len(), path = %path.display(), "loaded price data");
        PriceSeries::new(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, LogicTraderError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}
