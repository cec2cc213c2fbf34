//! Configuration validation.
//!
//! Runs before any price data is loaded, so a bad config fails fast.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::domain::error::LogicTraderError;
use crate::domain::rule::Comparator;
use crate::domain::strategy::{Direction, EntryMode, TrailingTrigger};
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    validate_positive(config, "backtest", "starting_balance", 10_000.0)?;
    validate_risk_per_trade(config)?;
    validate_positive(config, "backtest", "leverage", 1.0)?;
    validate_positive(config, "backtest", "pip_scale", 1.0)?;
    validate_non_negative(config, "backtest", "default_spread_points")?;
    validate_dates(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    validate_mode(config)?;
    validate_non_negative(config, "strategy", "cooldown_minutes")?;
    validate_max_concurrent(config)?;
    validate_rules(config)?;
    validate_entries(config)?;
    validate_exit(config)?;
    Ok(())
}

/// Section name of rule `id`.
pub fn rule_section(id: &str) -> String {
    format!("rule.{}", id)
}

/// Section name of logic entry `id`.
pub fn entry_section(id: &str) -> String {
    format!("entry.{}", id)
}

/// Section name of custom exit `id`.
pub fn exit_section(id: &str) -> String {
    format!("exit.{}", id)
}

/// Parse a `start`/`end` bound. A bare date means the start of the day for
/// `start` and its last second for `end`.
pub fn parse_bound(
    value: &str,
    key: &str,
    end_of_day: bool,
) -> Result<NaiveDateTime, LogicTraderError> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(t);
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            key,
            format!("invalid {} format, expected YYYY-MM-DD [HH:MM[:SS]]", key),
        )
    })?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    };
    match time {
        Some(t) => Ok(date.and_time(t)),
        None => Err(invalid("backtest", key, "invalid time of day".to_string())),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> LogicTraderError {
    LogicTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn missing(section: &str, key: &str) -> LogicTraderError {
    LogicTraderError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, LogicTraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(missing(section, key)),
    }
}

/// Numbers are checked on the raw string so that a typo is reported
/// instead of silently falling back to the default.
fn number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, LogicTraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("'{}' is not a number", raw.trim()))),
    }
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), LogicTraderError> {
    let value = number(config, section, key)?.unwrap_or(default);
    if !(value > 0.0) {
        return Err(invalid(section, key, format!("{} must be positive", key)));
    }
    Ok(())
}

fn validate_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), LogicTraderError> {
    if let Some(value) = number(config, section, key)? {
        if value < 0.0 {
            return Err(invalid(section, key, format!("{} must be non-negative", key)));
        }
    }
    Ok(())
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    let value = number(config, "backtest", "risk_per_trade")?.unwrap_or(0.01);
    if value <= 0.0 || value > 1.0 {
        return Err(invalid(
            "backtest",
            "risk_per_trade",
            "risk_per_trade must be between 0 and 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    let start = config
        .get_string("backtest", "start")
        .map(|s| parse_bound(&s, "start", false))
        .transpose()?;
    let end = config
        .get_string("backtest", "end")
        .map(|s| parse_bound(&s, "end", true))
        .transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "backtest",
                "start",
                "start must be before end".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_mode(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    if let Some(mode) = config.get_string("strategy", "mode") {
        mode.parse::<EntryMode>()
            .map_err(|reason| invalid("strategy", "mode", reason))?;
    }
    Ok(())
}

fn validate_max_concurrent(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    if let Some(value) = number(config, "strategy", "max_concurrent")? {
        if value < 1.0 || value.fract() != 0.0 {
            return Err(invalid(
                "strategy",
                "max_concurrent",
                "max_concurrent must be a whole number of at least 1".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_rules(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    let ids = config.get_list("strategy", "rules");
    if ids.is_empty() {
        return Err(missing("strategy", "rules"));
    }
    for (i, id) in ids.iter().enumerate() {
        if ids[..i].contains(id) {
            return Err(LogicTraderError::RuleInvalid {
                rule: id.clone(),
                reason: "duplicate rule id".to_string(),
            });
        }
        validate_identifier(id, "strategy", "rules")?;
        let section = rule_section(id);
        required(config, &section, "left")?;
        required(config, &section, "right")?;
        let comparator = required(config, &section, "comparator")?;
        comparator
            .parse::<Comparator>()
            .map_err(|reason| invalid(&section, "comparator", reason))?;
    }
    Ok(())
}

fn validate_entries(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    let ids = config.get_list("strategy", "entries");
    if ids.is_empty() {
        return Err(missing("strategy", "entries"));
    }
    for (i, id) in ids.iter().enumerate() {
        // sections are case-insensitive, so L1 and l1 share one
        if ids[..i].iter().any(|prev| prev.eq_ignore_ascii_case(id)) {
            return Err(invalid(
                "strategy",
                "entries",
                format!("duplicate entry id '{}'", id),
            ));
        }
        let section = entry_section(id);
        required(config, &section, "direction")?
            .parse::<Direction>()
            .map_err(|reason| invalid(&section, "direction", reason))?;
        required(config, &section, "when")?;
        validate_non_negative(config, &section, "stop")?;
        validate_non_negative(config, &section, "target")?;
    }
    Ok(())
}

fn validate_exit(config: &dyn ConfigPort) -> Result<(), LogicTraderError> {
    for id in config.get_list("exit", "custom") {
        required(config, &exit_section(&id), "when")?;
    }

    let trigger = match config.get_string("exit", "trailing_trigger") {
        None => return Ok(()),
        Some(raw) => raw
            .parse::<TrailingTrigger>()
            .map_err(|reason| invalid("exit", "trailing_trigger", reason))?,
    };
    validate_positive(config, "exit", "trailing_distance", 50.0)?;
    if number(config, "exit", "trailing_step")?.is_some() {
        validate_positive(config, "exit", "trailing_step", 1.0)?;
    }
    if trigger == TrailingTrigger::Custom {
        required(config, "exit", "trailing_when")?;
    }
    Ok(())
}

fn validate_identifier(id: &str, section: &str, key: &str) -> Result<(), LogicTraderError> {
    if id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(invalid(
            section,
            key,
            format!("rule id '{}' may only contain letters, digits and '_'", id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const STRATEGY: &str = r#"
[strategy]
name = Cross
rules = R1, R2
entries = L1
mode = pyramided
cooldown_minutes = 15
max_concurrent = 2

[rule.R1]
left = sma(period=10)
comparator = crosses_above
right = sma(period=30)

[rule.R2]
left = rsi(period=14)
comparator = below
right = 70

[entry.L1]
direction = long
when = R1 & R2
stop = 50
target = 150
"#;

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            "[backtest]\nstarting_balance = 5000\nrisk_per_trade = 0.02\nleverage = 30\nstart = 2024-01-01\nend = 2024-03-31\n",
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn defaults_are_valid() {
        let config = make_config("[backtest]\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn starting_balance_must_be_positive() {
        let config = make_config("[backtest]\nstarting_balance = 0\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "starting_balance")
        );
    }

    #[test]
    fn non_numeric_value_is_reported() {
        let config = make_config("[backtest]\nleverage = lots\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "leverage"));
    }

    #[test]
    fn risk_per_trade_above_one_fails() {
        let config = make_config("[backtest]\nrisk_per_trade = 1.5\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "risk_per_trade")
        );
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config("[backtest]\nstart = 2024-05-01\nend = 2024-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "start"));
    }

    #[test]
    fn bad_date_format_fails() {
        let config = make_config("[backtest]\nstart = 01/02/2024\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "start"));
    }

    #[test]
    fn bounds_cover_whole_days() {
        let start = parse_bound("2024-01-02", "start", false).unwrap();
        let end = parse_bound("2024-01-02", "end", true).unwrap();
        assert_eq!(start.to_string(), "2024-01-02 00:00:00");
        assert_eq!(end.to_string(), "2024-01-02 23:59:59");
        let exact = parse_bound("2024-01-02 10:30", "end", true).unwrap();
        assert_eq!(exact.to_string(), "2024-01-02 10:30:00");
    }

    #[test]
    fn valid_strategy_config_passes() {
        assert!(validate_strategy_config(&make_config(STRATEGY)).is_ok());
    }

    #[test]
    fn missing_rules_fails() {
        let config = make_config("[strategy]\nentries = L1\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigMissing { key, .. } if key == "rules"));
    }

    #[test]
    fn unknown_comparator_fails() {
        let content = STRATEGY.replace("comparator = below", "comparator = beneath");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigInvalid { section, key, .. } if section == "rule.R2" && key == "comparator")
        );
    }

    #[test]
    fn missing_rule_section_fails() {
        let content = STRATEGY.replace("rules = R1, R2", "rules = R1, R2, R3");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigMissing { section, key } if section == "rule.R3" && key == "left")
        );
    }

    #[test]
    fn duplicate_rule_id_fails() {
        let content = STRATEGY.replace("rules = R1, R2", "rules = R1, R1");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, LogicTraderError::RuleInvalid { .. }));
    }

    #[test]
    fn duplicate_entry_id_fails() {
        let content = STRATEGY.replace("entries = L1", "entries = L1, l1");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        match err {
            LogicTraderError::ConfigInvalid { key, reason, .. } => {
                assert_eq!(key, "entries");
                assert!(reason.contains("duplicate entry id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_direction_fails() {
        let content = STRATEGY.replace("direction = long", "direction = up");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "direction"));
    }

    #[test]
    fn negative_stop_fails() {
        let content = STRATEGY.replace("stop = 50", "stop = -5");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "stop"));
    }

    #[test]
    fn max_concurrent_zero_fails() {
        let content = STRATEGY.replace("max_concurrent = 2", "max_concurrent = 0");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "max_concurrent")
        );
    }

    #[test]
    fn unknown_mode_fails() {
        let content = STRATEGY.replace("mode = pyramided", "mode = hedged");
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(matches!(err, LogicTraderError::ConfigInvalid { key, .. } if key == "mode"));
    }

    #[test]
    fn custom_trailing_requires_expression() {
        let content = format!("{}\n[exit]\ntrailing_trigger = custom\n", STRATEGY);
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigMissing { key, .. } if key == "trailing_when")
        );
    }

    #[test]
    fn custom_exit_requires_section() {
        let content = format!("{}\n[exit]\ncustom = E1\n", STRATEGY);
        let err = validate_strategy_config(&make_config(&content)).unwrap_err();
        assert!(
            matches!(err, LogicTraderError::ConfigMissing { section, .. } if section == "exit.E1")
        );
    }
}
