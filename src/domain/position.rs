//! Simulated positions and their closed-trade records.

use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::domain::signal::ResolvedSignal;
use crate::domain::strategy::Direction;

/// Sequential position id, displayed as `T001`, `T002`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionId(pub usize);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{:03}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    TrailingStop,
    StopLoss,
    TakeProfit,
    OppositeSignal,
    Custom(String),
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::TrailingStop => f.write_str("trailing_stop"),
            ExitReason::StopLoss => f.write_str("stop_loss"),
            ExitReason::TakeProfit => f.write_str("take_profit"),
            ExitReason::OppositeSignal => f.write_str("opposite_signal"),
            ExitReason::Custom(id) => f.write_str(id),
        }
    }
}

/// Frozen exit of a position. `reason` is `None` for the end-of-data close.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitFill {
    pub time: NaiveDateTime,
    pub price: f64,
    pub reason: Option<ExitReason>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: PositionId,
    pub logic_id: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    /// Stop distance in pips.
    pub stop_distance: f64,
    /// Target distance in pips.
    pub target_distance: f64,
    pub trailing_stop_level: Option<f64>,
    pub exit: Option<ExitFill>,
}

impl Position {
    pub fn open(
        id: PositionId,
        signal: &ResolvedSignal,
        entry_time: NaiveDateTime,
        entry_price: f64,
    ) -> Self {
        Self {
            id,
            logic_id: signal.logic_id.clone(),
            direction: signal.direction,
            entry_time,
            entry_price,
            stop_distance: signal.stop_distance,
            target_distance: signal.target_distance,
            trailing_stop_level: None,
            exit: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    /// Whether `price` is beyond the entry in the position's favour.
    pub fn is_favorable(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price > self.entry_price,
            Direction::Short => price < self.entry_price,
        }
    }

    pub fn close(&mut self, time: NaiveDateTime, price: f64, reason: Option<ExitReason>) {
        self.exit = Some(ExitFill {
            time,
            price,
            reason,
        });
    }
}

/// A closed position with its realised performance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub id: PositionId,
    pub logic_id: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: Option<ExitReason>,
    pub stop_distance: f64,
    pub target_distance: f64,
    pub pnl: f64,
    pub duration: Duration,
    pub return_pct: f64,
    pub max_favorable: f64,
    pub max_adverse: f64,
    pub risk_reward_ratio: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signal(direction: Direction) -> ResolvedSignal {
        ResolvedSignal {
            logic_id: "L1".into(),
            direction,
            stop_distance: 50.0,
            target_distance: 150.0,
        }
    }

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn id_display_is_zero_padded() {
        assert_eq!(PositionId(7).to_string(), "T007");
        assert_eq!(PositionId(1234).to_string(), "T1234");
    }

    #[test]
    fn open_copies_signal() {
        let p = Position::open(PositionId(1), &signal(Direction::Short), t0(), 1.1);
        assert_eq!(p.logic_id, "L1");
        assert_eq!(p.direction, Direction::Short);
        assert_eq!(p.stop_distance, 50.0);
        assert!(p.is_open());
        assert!(p.trailing_stop_level.is_none());
    }

    #[test]
    fn favorable_depends_on_direction() {
        let long = Position::open(PositionId(1), &signal(Direction::Long), t0(), 1.1);
        let short = Position::open(PositionId(2), &signal(Direction::Short), t0(), 1.1);
        assert!(long.is_favorable(1.2));
        assert!(!long.is_favorable(1.1));
        assert!(short.is_favorable(1.0));
        assert!(!short.is_favorable(1.2));
    }

    #[test]
    fn close_freezes_exit() {
        let mut p = Position::open(PositionId(1), &signal(Direction::Long), t0(), 1.1);
        p.close(t0(), 1.2, Some(ExitReason::TakeProfit));
        assert!(!p.is_open());
        assert_eq!(p.exit.as_ref().map(|e| e.price), Some(1.2));
    }

    #[test]
    fn exit_reason_names() {
        assert_eq!(ExitReason::TrailingStop.to_string(), "trailing_stop");
        assert_eq!(ExitReason::OppositeSignal.to_string(), "opposite_signal");
        assert_eq!(ExitReason::Custom("E1".into()).to_string(), "E1");
    }
}
