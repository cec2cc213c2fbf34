//! Front-to-back trade simulation.
//!
//! Rule masks and resolved signals are computed once for the whole series.
//! The loop then walks the bars in order; at every step open positions are
//! checked for exit before any new entry is considered, so a position
//! closed at a step frees its slot for an entry at the same step.

use crate::domain::entry_gate::{BlockedSignal, EntryGate};
use crate::domain::error::LogicTraderError;
use crate::domain::exit::{ExitContext, ExitDecision, ExitEngine};
use crate::domain::indicator_cache::IndicatorCache;
use crate::domain::ohlcv::{OhlcvBar, PriceSeries};
use crate::domain::position::{Position, PositionId};
use crate::domain::rule_eval::{evaluate_rules, RuleMasks};
use crate::domain::signal::{evaluate_signals, SignalSet};
use crate::domain::strategy::{AccountConfig, Direction, Strategy};
use crate::ports::indicator_port::IndicatorPort;

#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Every position of the run, in entry order. All are closed.
    pub positions: Vec<Position>,
    pub rule_masks: RuleMasks,
    pub signals: SignalSet,
    pub blocked: Vec<BlockedSignal>,
}

impl BacktestResult {
    pub fn trade_count(&self) -> usize {
        self.positions.len()
    }
}

/// Fill price for a new position: longs buy at the ask (`close + spread`),
/// shorts sell at the bid.
pub fn entry_price(bar: &OhlcvBar, direction: Direction, account: &AccountConfig) -> f64 {
    match direction {
        Direction::Long => bar.close + account.spread_price(bar.spread),
        Direction::Short => bar.close,
    }
}

pub fn run_backtest(
    series: &PriceSeries,
    strategy: &Strategy,
    account: &AccountConfig,
    port: &dyn IndicatorPort,
) -> Result<BacktestResult, LogicTraderError> {
    if series.is_empty() {
        return Err(LogicTraderError::NoData {
            symbol: strategy.name.clone(),
        });
    }

    let exit_engine = ExitEngine::new(&strategy.exit, account, &strategy.rules)?;
    let mut cache = IndicatorCache::new();
    let rule_masks = evaluate_rules(&strategy.rules, series, port, &mut cache)?;
    let signals = evaluate_signals(&strategy.entries, &rule_masks, series.len());

    tracing::info!(
        strategy = %strategy.name,
        bars = series.len(),
        rules = strategy.rules.len(),
        indicators = cache.len(),
        signals = signals.signal_count(),
        "simulation starting"
    );

    let mut gate = EntryGate::new(strategy.entry_policy.clone());
    let mut open: Vec<Position> = Vec::new();
    let mut closed: Vec<Position> = Vec::new();
    let mut next_id = 1;

    for (step, bar) in series.bars().iter().enumerate() {
        let signal = signals.signal_at(step);
        let ctx = ExitContext {
            price: bar.close,
            signal: signal.map(|s| s.direction),
            rule_masks: Some(&rule_masks),
            step,
            period_close: Some(bar.close),
        };

        let mut still_open = Vec::with_capacity(open.len());
        for mut position in open.drain(..) {
            match exit_engine.evaluate_exit(&mut position, &ctx)? {
                ExitDecision::Exit { reason, price } => {
                    tracing::debug!(
                        position = %position.id,
                        time = %bar.time,
                        price,
                        %reason,
                        "position closed"
                    );
                    position.close(bar.time, price, Some(reason));
                    gate.deregister(&position);
                    closed.push(position);
                }
                ExitDecision::Hold => still_open.push(position),
            }
        }
        open = still_open;

        if let Some(signal) = signal {
            if gate.allow_entry(bar.time, signal.direction, &open) {
                let price = entry_price(bar, signal.direction, account);
                let position = Position::open(PositionId(next_id), signal, bar.time, price);
                next_id += 1;
                tracing::debug!(
                    position = %position.id,
                    logic_id = %position.logic_id,
                    direction = %position.direction,
                    time = %bar.time,
                    price,
                    "position opened"
                );
                gate.register(&position);
                open.push(position);
            }
        }
    }

    let last = series.last();
    for mut position in open.drain(..) {
        let price = match position.direction {
            Direction::Long => last.close + account.spread_price(last.spread),
            Direction::Short => last.close,
        };
        position.close(last.time, price, None);
        gate.deregister(&position);
        closed.push(position);
    }

    closed.sort_by_key(|p| p.id);
    let blocked = gate.into_blocked_log();

    tracing::info!(
        strategy = %strategy.name,
        trades = closed.len(),
        blocked = blocked.len(),
        "simulation finished"
    );

    Ok(BacktestResult {
        positions: closed,
        rule_masks,
        signals,
        blocked,
    })
}
