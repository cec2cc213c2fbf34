//! CLI definition and dispatch.

use chrono::{Duration, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::builtin_indicators::BuiltinIndicators;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestResult};
use crate::domain::config_validation::{
    entry_section, exit_section, parse_bound, rule_section, validate_backtest_config,
    validate_strategy_config,
};
use crate::domain::error::LogicTraderError;
use crate::domain::exit::ExitEngine;
use crate::domain::logic::LogicExpression;
use crate::domain::metrics::{evaluate_performance, Performance};
use crate::domain::rule::{Comparator, Operand, Rule};
use crate::domain::rule_parser;
use crate::domain::strategy::{
    AccountConfig, CustomExit, Direction, EntryMode, EntryPolicy, ExitConfig, LogicEntry,
    Strategy, TrailingConfig, TrailingTrigger, DEFAULT_PIP_SCALE, DEFAULT_SPREAD_POINTS,
    DEFAULT_TRAILING_DISTANCE,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::indicator_port::IndicatorPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_OUTPUT_DIR: &str = "report";

#[derive(Parser, Debug)]
#[command(name = "logictrader", about = "Rule-driven trading strategy simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        /// Directory for trades.csv, equity.csv and summary.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the data range of a symbol
    Info {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbol,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, data_dir.as_deref(), symbol.as_deref())
            } else {
                run_backtest(&config, data_dir.as_deref(), symbol.as_deref(), output.as_deref())
            }
        }
        Command::Validate { strategy } => run_validate(&strategy),
        Command::ListSymbols { data_dir, config } => {
            run_list_symbols(data_dir.as_deref(), config.as_deref())
        }
        Command::Info {
            symbol,
            data_dir,
            config,
        } => run_info(symbol.as_deref(), data_dir.as_deref(), config.as_deref()),
    }
}

fn fail(err: &LogicTraderError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = LogicTraderError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        fail(&err)
    })
}

fn config_invalid(section: &str, key: &str, reason: String) -> LogicTraderError {
    LogicTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn required(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<String, LogicTraderError> {
    adapter
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| LogicTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

pub fn build_account_config(adapter: &dyn ConfigPort) -> AccountConfig {
    AccountConfig {
        starting_balance: adapter.get_double("backtest", "starting_balance", 10_000.0),
        risk_per_trade: adapter.get_double("backtest", "risk_per_trade", 0.01),
        leverage: adapter.get_double("backtest", "leverage", 1.0),
        pip_scale: adapter.get_double("backtest", "pip_scale", DEFAULT_PIP_SCALE),
        default_spread_points: adapter.get_double(
            "backtest",
            "default_spread_points",
            DEFAULT_SPREAD_POINTS,
        ),
    }
}

/// `start`/`end` from `[backtest]`; absent keys leave the range open.
pub fn build_date_range(
    adapter: &dyn ConfigPort,
) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>), LogicTraderError> {
    let start = adapter
        .get_string("backtest", "start")
        .map(|s| parse_bound(&s, "start", false))
        .transpose()?;
    let end = adapter
        .get_string("backtest", "end")
        .map(|s| parse_bound(&s, "end", true))
        .transpose()?;
    Ok((start, end))
}

fn parse_operand(rule_id: &str, side: &str, raw: &str) -> Result<Operand, LogicTraderError> {
    rule_parser::parse_operand(raw).map_err(|e| LogicTraderError::RuleInvalid {
        rule: rule_id.to_string(),
        reason: format!("{} operand\n{}", side, e.display_with_context(raw)),
    })
}

fn build_rule(adapter: &dyn ConfigPort, id: &str) -> Result<Rule, LogicTraderError> {
    let section = rule_section(id);
    let left = required(adapter, &section, "left")?;
    let right = required(adapter, &section, "right")?;
    let comparator = required(adapter, &section, "comparator")?
        .parse::<Comparator>()
        .map_err(|reason| config_invalid(&section, "comparator", reason))?;
    Ok(Rule {
        id: id.to_string(),
        left: parse_operand(id, "left", &left)?,
        right: parse_operand(id, "right", &right)?,
        comparator,
    })
}

fn build_entry(adapter: &dyn ConfigPort, id: &str) -> Result<LogicEntry, LogicTraderError> {
    let section = entry_section(id);
    let direction = required(adapter, &section, "direction")?
        .parse::<Direction>()
        .map_err(|reason| config_invalid(&section, "direction", reason))?;
    Ok(LogicEntry {
        id: id.to_string(),
        direction,
        expression: required(adapter, &section, "when")?,
        stop_distance: adapter.get_double(&section, "stop", 0.0),
        target_distance: adapter.get_double(&section, "target", 0.0),
    })
}

fn build_entry_policy(adapter: &dyn ConfigPort) -> Result<EntryPolicy, LogicTraderError> {
    let mode = adapter
        .get_string("strategy", "mode")
        .map(|m| m.parse::<EntryMode>())
        .transpose()
        .map_err(|reason| config_invalid("strategy", "mode", reason))?
        .unwrap_or_default();
    let cooldown_minutes = adapter.get_double("strategy", "cooldown_minutes", 0.0);
    let max_concurrent = adapter.get_double("strategy", "max_concurrent", 0.0);
    Ok(EntryPolicy {
        mode,
        cooldown: (cooldown_minutes > 0.0)
            .then(|| Duration::seconds((cooldown_minutes * 60.0).round() as i64)),
        max_concurrent: (max_concurrent >= 1.0).then_some(max_concurrent as usize),
    })
}

fn build_exit_config(adapter: &dyn ConfigPort) -> Result<ExitConfig, LogicTraderError> {
    let custom_exits = adapter
        .get_list("exit", "custom")
        .into_iter()
        .map(|id| -> Result<CustomExit, LogicTraderError> {
            let expression = required(adapter, &exit_section(&id), "when")?;
            Ok(CustomExit {
                id: Some(id),
                expression,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let trailing = match adapter.get_string("exit", "trailing_trigger") {
        None => None,
        Some(raw) => {
            let trigger = raw
                .parse::<TrailingTrigger>()
                .map_err(|reason| config_invalid("exit", "trailing_trigger", reason))?;
            let step_size = adapter
                .get_string("exit", "trailing_step")
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    s.trim().parse::<f64>().map_err(|_| {
                        config_invalid("exit", "trailing_step", format!("'{}' is not a number", s))
                    })
                })
                .transpose()?;
            Some(TrailingConfig {
                trigger,
                distance: adapter.get_double("exit", "trailing_distance", DEFAULT_TRAILING_DISTANCE),
                step_size,
                expression: adapter
                    .get_string("exit", "trailing_when")
                    .filter(|s| !s.trim().is_empty()),
            })
        }
    };

    Ok(ExitConfig {
        use_opposite_signal: adapter.get_bool("exit", "use_opposite_signal", false),
        custom_exits,
        trailing,
    })
}

pub fn build_strategy(adapter: &dyn ConfigPort) -> Result<Strategy, LogicTraderError> {
    let name = adapter
        .get_string("strategy", "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let description = adapter
        .get_string("strategy", "description")
        .unwrap_or_default();

    let rules = adapter
        .get_list("strategy", "rules")
        .iter()
        .map(|id| build_rule(adapter, id))
        .collect::<Result<Vec<_>, _>>()?;
    let entries = adapter
        .get_list("strategy", "entries")
        .iter()
        .map(|id| build_entry(adapter, id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Strategy {
        name,
        description,
        rules,
        entries,
        entry_policy: build_entry_policy(adapter)?,
        exit: build_exit_config(adapter)?,
    })
}

/// Compile every entry and exit expression against the strategy's rule ids.
///
/// A backtest tolerates a broken entry (it is skipped with a warning); this
/// stricter check is what `validate` and `--dry-run` report.
pub fn check_expressions(strategy: &Strategy, account: &AccountConfig) -> Result<(), LogicTraderError> {
    let ids = || strategy.rules.iter().map(|r| r.id.as_str());
    for entry in &strategy.entries {
        if let Err(e) = LogicExpression::compile(&entry.expression, ids()) {
            eprintln!(
                "in entry {}:\n  {}\n  {}^",
                entry.id,
                entry.expression,
                " ".repeat(e.position)
            );
            return Err(e.into());
        }
    }
    ExitEngine::new(&strategy.exit, account, &strategy.rules)?;
    Ok(())
}

fn print_strategy(strategy: &Strategy) {
    eprintln!("\nRules:");
    for rule in &strategy.rules {
        eprintln!("  {}", rule);
    }
    eprintln!("\nEntries:");
    for entry in &strategy.entries {
        eprintln!(
            "  {}: {} when {} (stop {}, target {})",
            entry.id, entry.direction, entry.expression, entry.stop_distance, entry.target_distance
        );
    }
    let policy = &strategy.entry_policy;
    eprintln!("\nEntry policy: {}", policy.mode);
    if let Some(cooldown) = policy.cooldown {
        eprintln!("  cooldown: {} min", cooldown.num_minutes());
    }
    if let Some(max) = policy.max_concurrent {
        eprintln!("  max concurrent: {}", max);
    }

    let exit = &strategy.exit;
    eprintln!("\nExits:");
    eprintln!("  opposite signal: {}", exit.use_opposite_signal);
    if let Some(t) = &exit.trailing {
        eprintln!("  trailing: {} at {} pips", t.trigger, t.distance);
    }
    for custom in &exit.custom_exits {
        eprintln!(
            "  {}: {}",
            custom.id.as_deref().unwrap_or("custom_exit"),
            custom.expression
        );
    }
}

pub fn resolve_data_dir(data_dir: Option<&Path>, config: Option<&dyn ConfigPort>) -> PathBuf {
    data_dir
        .map(Path::to_path_buf)
        .or_else(|| config.and_then(|c| c.get_string("backtest", "data_dir").map(PathBuf::from)))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn resolve_symbol(symbol: Option<&str>, config: &dyn ConfigPort) -> Option<String> {
    symbol
        .map(str::to_string)
        .or_else(|| config.get_string("backtest", "symbol"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Stages shared by the CLI and the integration tests: validate, load,
/// simulate, replay.
fn load_validated(config_path: &Path) -> Result<(FileConfigAdapter, Strategy, AccountConfig), ExitCode> {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = load_config(config_path)?;
    validate_backtest_config(&adapter).map_err(|e| fail(&e))?;
    validate_strategy_config(&adapter).map_err(|e| fail(&e))?;
    let strategy = build_strategy(&adapter).map_err(|e| fail(&e))?;
    let account = build_account_config(&adapter);
    Ok((adapter, strategy, account))
}

fn run_backtest(
    config_path: &Path,
    data_dir: Option<&Path>,
    symbol: Option<&str>,
    output: Option<&Path>,
) -> ExitCode {
    let (adapter, strategy, account) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    eprintln!("Loading strategy: {}", strategy.name);

    let Some(symbol) = resolve_symbol(symbol, &adapter) else {
        return fail(&LogicTraderError::ConfigMissing {
            section: "backtest".into(),
            key: "symbol".into(),
        });
    };
    let (start, end) = match build_date_range(&adapter) {
        Ok(range) => range,
        Err(e) => return fail(&e),
    };
    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort)));
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    match run_backtest_pipeline(
        &data_port,
        &BuiltinIndicators,
        &CsvReportAdapter,
        &strategy,
        &account,
        &symbol,
        (start, end),
        &output,
    ) {
        Ok((result, performance)) => {
            print_summary(&result, &performance);
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    indicators: &dyn IndicatorPort,
    report: &dyn ReportPort,
    strategy: &Strategy,
    account: &AccountConfig,
    symbol: &str,
    range: (Option<NaiveDateTime>, Option<NaiveDateTime>),
    output: &Path,
) -> Result<(BacktestResult, Performance), LogicTraderError> {
    let series = data_port.fetch_bars(symbol, range.0, range.1)?;
    eprintln!(
        "Running backtest: {} bars of {}, {} to {}",
        series.len(),
        symbol,
        series.bars()[0].time,
        series.last().time
    );

    let result = backtest_engine::run_backtest(&series, strategy, account, indicators)?;
    let performance = evaluate_performance(&series, &result.positions, account)?;
    report.write(&performance, strategy, output)?;
    Ok((result, performance))
}

fn print_summary(result: &BacktestResult, performance: &Performance) {
    let m = &performance.metrics;
    eprintln!("\n=== Results ===");
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Wins:             {}", m.wins);
    eprintln!("Losses:           {}", m.losses);
    eprintln!("Win Rate:         {:.2}%", m.win_rate * 100.0);
    eprintln!("Total Profit:     {:.2}", m.total_profit);
    eprintln!("Average Win:      {:.2}", m.avg_win);
    eprintln!("Average Loss:     {:.2}", m.avg_loss);
    eprintln!("Final Balance:    {:.2}", m.final_balance);
    eprintln!("Average RRR:      {:.2}", m.avg_risk_reward);
    eprintln!("Blocked Signals:  {}", result.blocked.len());
    if !result.signals.failed.is_empty() {
        eprintln!("\nSkipped logic entries:");
        for failed in &result.signals.failed {
            eprintln!("  {}: {}", failed.logic_id, failed.error);
        }
    }
}

pub fn run_dry_run(config_path: &Path, data_dir: Option<&Path>, symbol: Option<&str>) -> ExitCode {
    let (adapter, strategy, account) = match load_validated(config_path) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    if let Err(e) = check_expressions(&strategy, &account) {
        return fail(&e);
    }
    eprintln!("Config validated successfully");
    eprintln!("\nStrategy: {}", strategy.name);
    print_strategy(&strategy);

    eprintln!("\nData:");
    eprintln!(
        "  directory: {}",
        resolve_data_dir(data_dir, Some(&adapter as &dyn ConfigPort)).display()
    );
    match resolve_symbol(symbol, &adapter) {
        Some(s) => eprintln!("  symbol: {}", s),
        None => {
            return fail(&LogicTraderError::ConfigMissing {
                section: "backtest".into(),
                key: "symbol".into(),
            });
        }
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(strategy_path: &Path) -> ExitCode {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let adapter = match load_config(strategy_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(&e);
    }
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = check_expressions(&strategy, &build_account_config(&adapter)) {
        return fail(&e);
    }
    print_strategy(&strategy);
    eprintln!("\nStrategy configuration is valid.");
    ExitCode::SUCCESS
}

fn load_optional_config(path: Option<&Path>) -> Result<Option<FileConfigAdapter>, ExitCode> {
    path.map(load_config).transpose()
}

fn run_list_symbols(data_dir: Option<&Path>, config_path: Option<&Path>) -> ExitCode {
    let config = match load_optional_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let dir = resolve_data_dir(data_dir, config.as_ref().map(|c| c as &dyn ConfigPort));
    let symbols = match CsvAdapter::new(dir.clone()).list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", dir.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

fn run_info(symbol: Option<&str>, data_dir: Option<&Path>, config_path: Option<&Path>) -> ExitCode {
    let config = match load_optional_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let symbol = match (symbol, &config) {
        (Some(s), _) => Some(s.to_string()),
        (None, Some(c)) => resolve_symbol(None, c),
        (None, None) => None,
    };
    let Some(symbol) = symbol else {
        eprintln!("error: symbol is required (use --symbol or set it in the config)");
        return ExitCode::from(2);
    };
    let dir = resolve_data_dir(data_dir, config.as_ref().map(|c| c as &dyn ConfigPort));
    match CsvAdapter::new(dir).fetch_bars(&symbol, None, None) {
        Ok(series) => {
            println!(
                "{}: {} bars, {} to {}",
                symbol,
                series.len(),
                series.bars()[0].time,
                series.last().time
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
