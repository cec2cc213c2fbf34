//! Per-tick evaluation for a live execution loop.
//!
//! A [`LiveEvaluator`] runs the same rule, signal, exit and admission logic
//! as [`run_backtest`](crate::domain::backtest::run_backtest), but for the
//! last bar of a window only. Feeding it every prefix of a series, and
//! opening the entries it proposes, reproduces the batch ledger except for
//! the end-of-data close.

use chrono::NaiveDateTime;

use crate::domain::backtest::entry_price;
use crate::domain::entry_gate::{BlockedSignal, EntryGate};
use crate::domain::error::LogicTraderError;
use crate::domain::exit::{ExitContext, ExitDecision, ExitEngine};
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::{ExitReason, Position, PositionId};
use crate::domain::rule_eval::evaluate_rules;
use crate::domain::signal::{evaluate_signals, ResolvedSignal};
use crate::domain::strategy::{AccountConfig, Strategy};
use crate::ports::indicator_port::IndicatorPort;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveExit {
    pub id: PositionId,
    pub reason: ExitReason,
    pub price: f64,
}

/// An admitted entry the caller may act on.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEntry {
    pub signal: ResolvedSignal,
    pub time: NaiveDateTime,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiveDecision {
    pub exits: Vec<LiveExit>,
    pub entry: Option<LiveEntry>,
}

pub struct LiveEvaluator {
    strategy: Strategy,
    account: AccountConfig,
    gate: EntryGate,
    exit_engine: ExitEngine,
}

impl LiveEvaluator {
    pub fn new(strategy: Strategy, account: AccountConfig) -> Result<Self, LogicTraderError> {
        let exit_engine = ExitEngine::new(&strategy.exit, &account, &strategy.rules)?;
        let gate = EntryGate::new(strategy.entry_policy.clone());
        Ok(Self {
            strategy,
            account,
            gate,
            exit_engine,
        })
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Decide exits and entry at the last bar of `window`.
    ///
    /// Positions that exit are closed in place and deregistered. The entry,
    /// if any, is only proposed: call [`register`](Self::register) once the
    /// position is actually open.
    pub fn evaluate(
        &mut self,
        window: &PriceSeries,
        open_positions: &mut [Position],
        port: &dyn IndicatorPort,
    ) -> Result<LiveDecision, LogicTraderError> {
        let mut cache = IndicatorCache::new();
        let masks = evaluate_rules(&self.strategy.rules, window, port, &mut cache)?;
        let signals = evaluate_signals(&self.strategy.entries, &masks, window.len());

        let step = window.len() - 1;
        let bar = window.last();
        let signal = signals.signal_at(step);
        let ctx = ExitContext {
            price: bar.close,
            signal: signal.map(|s| s.direction),
            rule_masks: Some(&masks),
            step,
            period_close: Some(bar.close),
        };

        let mut decision = LiveDecision::default();
        for position in open_positions.iter_mut().filter(|p| p.is_open()) {
            if let ExitDecision::Exit { reason, price } =
                self.exit_engine.evaluate_exit(position, &ctx)?
            {
                position.close(bar.time, price, Some(reason.clone()));
                self.gate.deregister(position);
                decision.exits.push(LiveExit {
                    id: position.id,
                    reason,
                    price,
                });
            }
        }

        if let Some(signal) = signal {
            let still_open: Vec<Position> = open_positions
                .iter()
                .filter(|p| p.is_open())
                .cloned()
                .collect();
            if self.gate.allow_entry(bar.time, signal.direction, &still_open) {
                decision.entry = Some(LiveEntry {
                    signal: signal.clone(),
                    time: bar.time,
                    price: entry_price(bar, signal.direction, &self.account),
                });
            }
        }

        Ok(decision)
    }

    pub fn register(&mut self, position: &Position) {
        self.gate.register(position);
    }

    /// For positions closed outside [`evaluate`](Self::evaluate), e.g. by the broker.
    pub fn deregister(&mut self, position: &Position) {
        self.gate.deregister(position);
    }

    pub fn blocked_log(&self) -> &[BlockedSignal] {
        self.gate.blocked_log()
    }
}
