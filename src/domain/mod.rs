//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod indicator_cache;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod logic;
pub mod strategy;
pub mod signal;
pub mod position;
pub mod entry_gate;
pub mod exit;
pub mod backtest;
pub mod live;
pub mod metrics;
pub mod config_validation;
pub mod error;
