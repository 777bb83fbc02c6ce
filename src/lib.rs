//! Date-indexed portfolio accounting over a daily close-price table.
//!
//! A chronological replay of buy/sell transactions produces immutable daily
//! snapshots, a realized-trade ledger, and the derived profit and risk
//! statistics (std, beta, alpha, Sharpe) against a market benchmark.

pub mod calendar;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod market;
pub mod metrics;
pub mod position;
pub mod report;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use calendar::TradingCalendar;
pub use config::TrackerConfig;
pub use data::{PriceTable, Side, TradeRecord};
pub use engine::{AccountingEngine, History};
pub use error::{Error, Result};
pub use ledger::TradeLedger;
pub use market::MarketSeries;
pub use metrics::MetricsEngine;
pub use position::{OversellPolicy, Portfolio, Position};
pub use report::Reporter;
pub use snapshot::SnapshotStore;

/// Tolerance below which a cost basis is treated as zero when computing
/// percentage returns.
pub const EPS: f64 = 1e-6;

/// Annualized risk-free rate used by Sharpe and alpha when none is supplied.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
