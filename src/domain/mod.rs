//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod signal;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod risk;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod universe;
pub mod config_validation;
pub mod error;
