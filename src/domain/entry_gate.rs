//! Entry admission policy.
//!
//! One [`EntryGate`] belongs to one simulation (or one live session). It
//! decides whether a resolved signal may open a position, records every
//! rejection, and tracks which positions are registered as open.

use chrono::NaiveDateTime;

use crate::domain::position::{Position, PositionId};
use crate::domain::strategy::{Direction, EntryMode, EntryPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct BlockedSignal {
    pub time: NaiveDateTime,
    pub direction: Direction,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct EntryGate {
    policy: EntryPolicy,
    open_positions: Vec<PositionId>,
    last_entry_time: Option<NaiveDateTime>,
    blocked_log: Vec<BlockedSignal>,
}

impl EntryGate {
    pub fn new(policy: EntryPolicy) -> Self {
        Self {
            policy,
            open_positions: Vec::new(),
            last_entry_time: None,
            blocked_log: Vec::new(),
        }
    }

    /// Whether a new `direction` entry at `time` is admitted given the
    /// currently open positions. Rejections are logged, never raised.
    pub fn allow_entry(
        &mut self,
        time: NaiveDateTime,
        direction: Direction,
        open_positions: &[Position],
    ) -> bool {
        let open = open_positions.len();

        match self.policy.mode {
            EntryMode::Exclusive => {
                if open > 0 {
                    self.block(time, direction, "exclusive mode: position already open".into());
                    return false;
                }
            }
            EntryMode::Pyramided => {
                if let Some(cap) = self.policy.max_concurrent {
                    if open >= cap {
                        self.block(
                            time,
                            direction,
                            format!("{} open positions (max: {})", open, cap),
                        );
                        return false;
                    }
                }
            }
        }

        if let (Some(cooldown), Some(last)) = (self.policy.cooldown, self.last_entry_time) {
            let expiry = last + cooldown;
            if time <= expiry {
                self.block(time, direction, format!("cooldown active until {}", expiry));
                return false;
            }
        }

        true
    }

    pub fn register(&mut self, position: &Position) {
        self.open_positions.push(position.id);
        self.last_entry_time = Some(position.entry_time);
    }

    /// Remove a closed position; call exactly once per close.
    pub fn deregister(&mut self, position: &Position) {
        if let Some(idx) = self.open_positions.iter().position(|id| *id == position.id) {
            self.open_positions.remove(idx);
        } else {
            tracing::warn!(position = %position.id, "deregister of unknown position");
        }
    }

    pub fn open_positions(&self) -> &[PositionId] {
        &self.open_positions
    }

    pub fn last_entry_time(&self) -> Option<NaiveDateTime> {
        self.last_entry_time
    }

    pub fn blocked_log(&self) -> &[BlockedSignal] {
        &self.blocked_log
    }

    pub fn into_blocked_log(self) -> Vec<BlockedSignal> {
        self.blocked_log
    }

    fn block(&mut self, time: NaiveDateTime, direction: Direction, reason: String) {
        tracing::debug!(%time, %direction, %reason, "entry blocked");
        self.blocked_log.push(BlockedSignal {
            time,
            direction,
            reason,
        });
    }
}
