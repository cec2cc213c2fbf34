//! Performance replay and summary statistics.
//!
//! The ledger is replayed over the price series with a running balance.
//! Exposure is `balance * risk_per_trade * leverage`, computed once at the
//! start of every step and shared by all positions closing at that step.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::domain::error::LogicTraderError;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::strategy::{AccountConfig, Direction};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub time: NaiveDateTime,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub total_trades: usize,
    pub wins: usize,
    /// Trades with pnl <= 0.
    pub losses: usize,
    /// Fraction in `[0, 1]`.
    pub win_rate: f64,
    pub total_profit: f64,
    pub avg_win: f64,
    /// Mean pnl over the losses (pnl <= 0); zero or negative.
    pub avg_loss: f64,
    pub final_balance: f64,
    pub avg_risk_reward: f64,
}

impl Metrics {
    pub fn compute(trades: &[ClosedTrade], final_balance: f64) -> Self {
        let total_trades = trades.len();
        let wins: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| *p <= 0.0).collect();
        let ratios: Vec<f64> = trades.iter().filter_map(|t| t.risk_reward_ratio).collect();

        let win_rate = if total_trades > 0 {
            wins.len() as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_trades,
            wins: wins.len(),
            losses: losses.len(),
            win_rate,
            total_profit: trades.iter().map(|t| t.pnl).sum(),
            avg_win: mean_or_zero(&wins),
            avg_loss: mean_or_zero(&losses),
            final_balance,
            avg_risk_reward: mean_or_zero(&ratios),
        }
    }
}

fn mean_or_zero(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    /// Closed trades in entry order.
    pub trades: Vec<ClosedTrade>,
    /// Balance after every bar.
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: Metrics,
}

/// Reward distance over risk distance, `None` when the risk is zero.
///
/// Distances mix the entry price with the pip-denominated stop and target,
/// matching how ratios have always been reported for these strategies.
pub fn risk_reward_ratio(position: &Position) -> Option<f64> {
    let risk = (position.entry_price - position.stop_distance).abs();
    let reward = (position.target_distance - position.entry_price).abs();
    if risk > 0.0 {
        Some(reward / risk)
    } else {
        None
    }
}

struct Span {
    entry: usize,
    exit: usize,
}

fn span_of(series: &PriceSeries, position: &Position) -> Result<Option<Span>, LogicTraderError> {
    let Some(fill) = &position.exit else {
        tracing::warn!(position = %position.id, "skipping open position in performance replay");
        return Ok(None);
    };
    let locate = |time: NaiveDateTime| {
        series
            .position_of(time)
            .ok_or_else(|| LogicTraderError::InvalidPriceData {
                reason: format!("position {} references {} outside the series", position.id, time),
            })
    };
    Ok(Some(Span {
        entry: locate(position.entry_time)?,
        exit: locate(fill.time)?,
    }))
}

pub fn evaluate_performance(
    series: &PriceSeries,
    positions: &[Position],
    account: &AccountConfig,
) -> Result<Performance, LogicTraderError> {
    let closes = series.closes();
    // closed positions grouped by the step they exit on
    let mut closing: BTreeMap<usize, Vec<(&Position, Span)>> = BTreeMap::new();
    let mut closed = 0;
    for position in positions {
        if let Some(span) = span_of(series, position)? {
            closing.entry(span.exit).or_default().push((position, span));
            closed += 1;
        }
    }

    let mut balance = account.starting_balance;
    let mut equity_curve = Vec::with_capacity(series.len());
    let mut trades: Vec<ClosedTrade> = Vec::with_capacity(closed);

    for (step, bar) in series.bars().iter().enumerate() {
        let exposure = balance * account.risk_per_trade * account.leverage;

        for (position, span) in closing.remove(&step).unwrap_or_default() {
            let Some(fill) = &position.exit else { continue };
            let entry = position.entry_price;
            let sign = position.direction.sign();
            let raw = (fill.price - entry) * sign;
            let pnl = raw * exposure;

            let window = &closes[span.entry.min(span.exit)..=span.exit];
            let high = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let low = window.iter().copied().fold(f64::INFINITY, f64::min);
            let (favorable, adverse) = match position.direction {
                Direction::Long => (high - entry, low - entry),
                Direction::Short => (entry - low, entry - high),
            };

            balance += pnl;
            trades.push(ClosedTrade {
                id: position.id,
                logic_id: position.logic_id.clone(),
                direction: position.direction,
                entry_time: position.entry_time,
                entry_price: entry,
                exit_time: fill.time,
                exit_price: fill.price,
                exit_reason: fill.reason.clone(),
                stop_distance: position.stop_distance,
                target_distance: position.target_distance,
                pnl,
                duration: fill.time - position.entry_time,
                return_pct: raw / entry * 100.0,
                max_favorable: favorable / entry * exposure,
                max_adverse: adverse / entry * exposure,
                risk_reward_ratio: risk_reward_ratio(position),
            });
        }

        equity_curve.push(EquityPoint {
            time: bar.time,
            balance,
        });
    }

    trades.sort_by_key(|t| t.id);
    let metrics = Metrics::compute(&trades, balance);
    tracing::info!(
        trades = metrics.total_trades,
        final_balance = metrics.final_balance,
        "performance computed"
    );

    Ok(Performance {
        trades,
        equity_curve,
        metrics,
    })
}
