//! Strategy configuration and composition.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;

use crate::domain::rule::Rule;

/// Pips per unit of price for five-digit forex quotes.
pub const DEFAULT_PIP_SCALE: f64 = 100_000.0;
/// Spread assumed when a bar carries none, in points.
pub const DEFAULT_SPREAD_POINTS: f64 = 13.0;
/// Trailing distance used when the trailing config omits one, in pips.
pub const DEFAULT_TRAILING_DISTANCE: f64 = 50.0;
/// Reason recorded by a custom exit that has no id.
pub const DEFAULT_CUSTOM_EXIT_REASON: &str = "custom_exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Direction::Long),
            "short" | "sell" => Ok(Direction::Short),
            other => Err(format!("unknown direction '{}' (expected long or short)", other)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// A named entry condition: when `expression` holds, open in `direction`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicEntry {
    pub id: String,
    pub direction: Direction,
    pub expression: String,
    /// Stop distance in pips.
    pub stop_distance: f64,
    /// Target distance in pips.
    pub target_distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingTrigger {
    #[default]
    Always,
    AfterProfit,
    Custom,
    Stepwise,
}

impl FromStr for TrailingTrigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "always" => Ok(TrailingTrigger::Always),
            "after_profit" => Ok(TrailingTrigger::AfterProfit),
            "custom" => Ok(TrailingTrigger::Custom),
            "stepwise" => Ok(TrailingTrigger::Stepwise),
            other => Err(format!(
                "unknown trailing trigger '{}' (expected always, after_profit, custom or stepwise)",
                other
            )),
        }
    }
}

impl fmt::Display for TrailingTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrailingTrigger::Always => "always",
            TrailingTrigger::AfterProfit => "after_profit",
            TrailingTrigger::Custom => "custom",
            TrailingTrigger::Stepwise => "stepwise",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrailingConfig {
    pub trigger: TrailingTrigger,
    /// Trail distance in pips.
    pub distance: f64,
    /// Minimum level movement for `stepwise`, in price units.
    pub step_size: Option<f64>,
    /// Gate expression for `custom`.
    pub expression: Option<String>,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            trigger: TrailingTrigger::Always,
            distance: DEFAULT_TRAILING_DISTANCE,
            step_size: None,
            expression: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomExit {
    pub id: Option<String>,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExitConfig {
    pub use_opposite_signal: bool,
    pub custom_exits: Vec<CustomExit>,
    pub trailing: Option<TrailingConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryMode {
    #[default]
    Exclusive,
    Pyramided,
}

impl FromStr for EntryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" | "flat" => Ok(EntryMode::Exclusive),
            "pyramided" | "pyramiding" => Ok(EntryMode::Pyramided),
            other => Err(format!(
                "unknown entry mode '{}' (expected exclusive or pyramided)",
                other
            )),
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryMode::Exclusive => f.write_str("exclusive"),
            EntryMode::Pyramided => f.write_str("pyramided"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntryPolicy {
    pub mode: EntryMode,
    pub cooldown: Option<Duration>,
    pub max_concurrent: Option<usize>,
}

/// Account and market parameters shared by simulation and performance replay.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountConfig {
    pub starting_balance: f64,
    pub risk_per_trade: f64,
    pub leverage: f64,
    pub pip_scale: f64,
    pub default_spread_points: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            starting_balance: 10_000.0,
            risk_per_trade: 0.01,
            leverage: 1.0,
            pip_scale: DEFAULT_PIP_SCALE,
            default_spread_points: DEFAULT_SPREAD_POINTS,
        }
    }
}

impl AccountConfig {
    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips / self.pip_scale
    }

    /// Spread of a bar in price units, falling back to the default spread.
    pub fn spread_price(&self, spread_points: Option<f64>) -> f64 {
        let points = spread_points
            .filter(|s| !s.is_nan())
            .unwrap_or(self.default_spread_points);
        points / self.pip_scale
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub description: String,
    pub rules: Vec<Rule>,
    pub entries: Vec<LogicEntry>,
    pub entry_policy: EntryPolicy,
    pub exit: ExitConfig,
}
