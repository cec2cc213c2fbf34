//! Exit decisions for open positions.
//!
//! [`ExitEngine::evaluate_exit`] is called once per open position per step.
//! Checks run in a fixed order and the first match wins:
//!
//! 1. Trailing stop (when configured): ratchet the level, then test breach
//! 2. Classic stop-loss (only without trailing)
//! 3. Take-profit
//! 4. Opposite signal (when enabled)
//! 5. Custom exit expressions, in configured order
//!
//! Trailing, stop and target exits fill at the period close when one is
//! supplied; opposite-signal and custom exits fill at the observed price.

use crate::domain::error::{InvalidExpression, LogicTraderError};
use crate::domain::logic::LogicExpression;
use crate::domain::position::{ExitReason, Position};
use crate::domain::rule::Rule;
use crate::domain::rule_eval::RuleMasks;
use crate::domain::strategy::{
    AccountConfig, Direction, ExitConfig, TrailingTrigger, DEFAULT_CUSTOM_EXIT_REASON,
};

/// Market state seen by the exit checks at one step.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext<'a> {
    pub price: f64,
    /// Direction of the resolved entry signal at this step, if any.
    pub signal: Option<Direction>,
    pub rule_masks: Option<&'a RuleMasks>,
    /// Index into `rule_masks` of the current step.
    pub step: usize,
    pub period_close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitDecision {
    Hold,
    Exit { reason: ExitReason, price: f64 },
}

impl ExitDecision {
    pub fn is_exit(&self) -> bool {
        matches!(self, ExitDecision::Exit { .. })
    }
}

#[derive(Debug, Clone)]
struct Trailing {
    trigger: TrailingTrigger,
    distance: f64,
    step_size: f64,
    gate: Option<LogicExpression>,
}

#[derive(Debug, Clone)]
struct CustomExit {
    reason: ExitReason,
    expression: LogicExpression,
}

#[derive(Debug, Clone)]
pub struct ExitEngine {
    pip_scale: f64,
    use_opposite_signal: bool,
    trailing: Option<Trailing>,
    custom_exits: Vec<CustomExit>,
}

impl ExitEngine {
    /// Compile the exit configuration against the strategy's rule ids.
    ///
    /// Distances in `config` are pips; the trailing step size is already in
    /// price units and defaults to the trail distance.
    pub fn new(
        config: &ExitConfig,
        account: &AccountConfig,
        rules: &[Rule],
    ) -> Result<Self, LogicTraderError> {
        let rule_ids = || rules.iter().map(|r| r.id.as_str());

        let trailing = match &config.trailing {
            None => None,
            Some(t) => {
                if !(t.distance > 0.0) {
                    return Err(LogicTraderError::ConfigInvalid {
                        section: "exit".into(),
                        key: "trailing_distance".into(),
                        reason: "trailing distance must be positive".into(),
                    });
                }
                let distance = account.pips_to_price(t.distance);
                let step_size = t.step_size.unwrap_or(distance);
                if !(step_size > 0.0) {
                    return Err(LogicTraderError::ConfigInvalid {
                        section: "exit".into(),
                        key: "trailing_step".into(),
                        reason: "trailing step must be positive".into(),
                    });
                }
                let gate = match (&t.trigger, &t.expression) {
                    (TrailingTrigger::Custom, None) => {
                        return Err(LogicTraderError::ConfigMissing {
                            section: "exit".into(),
                            key: "trailing_when".into(),
                        });
                    }
                    (TrailingTrigger::Custom, Some(expr)) => {
                        Some(LogicExpression::compile(expr, rule_ids())?)
                    }
                    _ => None,
                };
                Some(Trailing {
                    trigger: t.trigger,
                    distance,
                    step_size,
                    gate,
                })
            }
        };

        let custom_exits = config
            .custom_exits
            .iter()
            .map(|c| {
                Ok(CustomExit {
                    reason: ExitReason::Custom(
                        c.id.clone()
                            .unwrap_or_else(|| DEFAULT_CUSTOM_EXIT_REASON.to_string()),
                    ),
                    expression: LogicExpression::compile(&c.expression, rule_ids())?,
                })
            })
            .collect::<Result<Vec<_>, InvalidExpression>>()?;

        Ok(Self {
            pip_scale: account.pip_scale,
            use_opposite_signal: config.use_opposite_signal,
            trailing,
            custom_exits,
        })
    }

    /// Decide whether `position` exits at this step. May move the
    /// position's trailing level even when it holds.
    pub fn evaluate_exit(
        &self,
        position: &mut Position,
        ctx: &ExitContext<'_>,
    ) -> Result<ExitDecision, InvalidExpression> {
        let price = ctx.price;
        let stop_fill = ctx.period_close.unwrap_or(price);
        let sign = position.direction.sign();
        let entry = position.entry_price;

        if let Some(trailing) = &self.trailing {
            let level = self.update_trailing(trailing, position, ctx)?;
            let breached = match position.direction {
                Direction::Long => price <= level,
                Direction::Short => price >= level,
            };
            if breached {
                return Ok(ExitDecision::Exit {
                    reason: ExitReason::TrailingStop,
                    price: stop_fill,
                });
            }
        } else {
            let stop = entry - sign * position.stop_distance / self.pip_scale;
            let hit = match position.direction {
                Direction::Long => price <= stop,
                Direction::Short => price >= stop,
            };
            if hit {
                return Ok(ExitDecision::Exit {
                    reason: ExitReason::StopLoss,
                    price: stop_fill,
                });
            }
        }

        let target = entry + sign * position.target_distance / self.pip_scale;
        let reached = match position.direction {
            Direction::Long => price >= target,
            Direction::Short => price <= target,
        };
        if reached {
            return Ok(ExitDecision::Exit {
                reason: ExitReason::TakeProfit,
                price: stop_fill,
            });
        }

        if self.use_opposite_signal && ctx.signal == Some(position.direction.opposite()) {
            return Ok(ExitDecision::Exit {
                reason: ExitReason::OppositeSignal,
                price,
            });
        }

        if let Some(masks) = ctx.rule_masks {
            for custom in &self.custom_exits {
                if custom.expression.evaluate_at(masks, ctx.step)? {
                    return Ok(ExitDecision::Exit {
                        reason: custom.reason.clone(),
                        price,
                    });
                }
            }
        }

        Ok(ExitDecision::Hold)
    }

    /// Ratchet the trailing level unless the trigger skips this step, and
    /// return the level in effect afterwards.
    fn update_trailing(
        &self,
        trailing: &Trailing,
        position: &mut Position,
        ctx: &ExitContext<'_>,
    ) -> Result<f64, InvalidExpression> {
        let sign = position.direction.sign();
        let default_level = position.entry_price - sign * trailing.distance;
        let last = position.trailing_stop_level.unwrap_or(default_level);
        let candidate = ctx.price - sign * trailing.distance;

        let skip = match trailing.trigger {
            TrailingTrigger::Always => false,
            TrailingTrigger::AfterProfit => !position.is_favorable(ctx.price),
            TrailingTrigger::Custom => match (&trailing.gate, ctx.rule_masks) {
                (Some(gate), Some(masks)) => !gate.evaluate_at(masks, ctx.step)?,
                _ => false,
            },
            TrailingTrigger::Stepwise => (ctx.price - last) * sign < trailing.step_size,
        };

        if skip {
            return Ok(last);
        }

        let level = match position.direction {
            Direction::Long => last.max(candidate),
            Direction::Short => last.min(candidate),
        };
        position.trailing_stop_level = Some(level);
        Ok(level)
    }
}
