#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use logictrader::domain::ohlcv::{OhlcvBar, PriceSeries};
use logictrader::domain::rule::{Comparator, IndicatorRef, Operand, Rule};
use logictrader::domain::strategy::{
    AccountConfig, Direction, EntryPolicy, ExitConfig, LogicEntry, Strategy,
};
use std::io::Write;
use std::path::Path;

/// Hourly timestamps from 2024-01-02 00:00.
pub fn at(step: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(step as i64)
}

pub fn make_bar(step: usize, close: f64) -> OhlcvBar {
    OhlcvBar {
        time: at(step),
        open: close,
        high: close,
        low: close,
        close,
        tick_volume: 100,
        volume: 0,
        spread: None,
    }
}

pub fn series(closes: &[f64]) -> PriceSeries {
    PriceSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| make_bar(i, *c))
            .collect(),
    )
    .unwrap()
}

pub fn price() -> Operand {
    Operand::Indicator(IndicatorRef {
        name: "price".into(),
        params: vec![],
        output: None,
    })
}

pub fn price_rule(id: &str, comparator: Comparator, level: f64) -> Rule {
    Rule {
        id: id.into(),
        left: price(),
        right: Operand::Constant(level),
        comparator,
    }
}

pub fn entry(id: &str, direction: Direction, when: &str, stop: f64, target: f64) -> LogicEntry {
    LogicEntry {
        id: id.into(),
        direction,
        expression: when.into(),
        stop_distance: stop,
        target_distance: target,
    }
}

pub fn strategy(rules: Vec<Rule>, entries: Vec<LogicEntry>, policy: EntryPolicy) -> Strategy {
    Strategy {
        name: "Test".into(),
        description: String::new(),
        rules,
        entries,
        entry_policy: policy,
        exit: ExitConfig::default(),
    }
}

/// One pip is one price unit and spreads are free.
pub fn unit_account() -> AccountConfig {
    AccountConfig {
        pip_scale: 1.0,
        default_spread_points: 0.0,
        ..AccountConfig::default()
    }
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Write `{dir}/{symbol}.csv` in terminal export layout with the given closes.
pub fn write_price_csv(dir: &Path, symbol: &str, closes: &[f64]) {
    let mut content = String::from("<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<TICKVOL>\t<VOL>\t<SPREAD>\n");
    for (i, close) in closes.iter().enumerate() {
        let t = at(i);
        content.push_str(&format!(
            "{}\t{}\t{c}\t{c}\t{c}\t{c}\t100\t0\t0\n",
            t.format("%Y.%m.%d"),
            t.format("%H:%M:%S"),
            c = close
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}
