//! Average-cost accounting: per-ticker positions and the portfolio that
//! aggregates them.
//!
//! A `Position` carries four running figures: quantity held, cumulative cost
//! basis of the held shares, latest mark-to-market value, and the net cash
//! flow from every buy (negative) and sell (positive) ever executed. All held
//! shares of a ticker share one blended cost, updated by weighted averaging on
//! each buy and reduced proportionally on each sell.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What to do when a sell order exceeds the held quantity.
///
/// The reject policy is the default: short selling is out of scope, so an
/// oversell is treated as an input error. `Allow` runs the unguarded
/// arithmetic instead, letting quantity go negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OversellPolicy {
    #[default]
    Reject,
    Allow,
}

impl OversellPolicy {
    /// Create OversellPolicy from string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "reject" => Ok(Self::Reject),
            "allow" => Ok(Self::Allow),
            _ => Err(format!("Unknown oversell policy: {}", s)),
        }
    }
}

/// Realized figures produced by one sell, captured against the average cost
/// basis at sell time.
#[derive(Debug, Clone, Copy)]
pub struct SellOutcome {
    pub profit: f64,
    pub cost_removed: f64,
}

/// Per-ticker accounting cell.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    /// Shares currently held.
    pub qty: i64,
    /// Cumulative dollars paid for the currently-held shares.
    pub cost: f64,
    /// Latest mark-to-market value (qty x last known close).
    pub value: f64,
    /// Net cash flow across all buys and sells of this ticker.
    pub cash: f64,
}

impl Position {
    /// Blended cost per held share; zero when the position is flat.
    pub fn avg_price(&self) -> f64 {
        if self.qty != 0 {
            self.cost / self.qty as f64
        } else {
            0.0
        }
    }

    /// Paper profit on the held shares.
    pub fn unrealized_profit(&self) -> f64 {
        self.value - self.cost
    }

    pub fn apply_buy(&mut self, price: f64, qty: i64) {
        let amount = price * qty as f64;
        self.qty += qty;
        self.cost += amount;
        self.cash -= amount;
    }

    /// Sell `qty` shares at `price` against the current average cost.
    ///
    /// A sell from a flat position uses a zero average, producing a degenerate
    /// zero-cost sale rather than an error. Oversell enforcement happens in
    /// the accounting engine, where the ticker is known.
    pub fn apply_sell(&mut self, price: f64, qty: i64) -> SellOutcome {
        let avg = self.avg_price();
        let outcome = SellOutcome {
            profit: (price - avg) * qty as f64,
            cost_removed: avg * qty as f64,
        };
        self.cash += price * qty as f64;
        self.cost -= outcome.cost_removed;
        self.qty -= qty;
        outcome
    }

    /// Revalue the held shares at `price`. Idempotent; called once per trading
    /// day after that day's trades are applied.
    pub fn mark_to_market(&mut self, price: f64) {
        self.value = price * self.qty as f64;
    }
}

/// Ticker -> Position mapping with aggregation over a selectable subset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    assets: HashMap<String, Position>,
}

impl Portfolio {
    /// Portfolio with one zero-state position per known ticker.
    pub fn new(tickers: &[String]) -> Self {
        Self {
            assets: tickers
                .iter()
                .map(|t| (t.clone(), Position::default()))
                .collect(),
        }
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.assets.get(ticker)
    }

    pub fn position_mut(&mut self, ticker: &str) -> &mut Position {
        self.assets.entry(ticker.to_string()).or_default()
    }

    /// Known tickers in sorted order.
    pub fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.assets.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    fn sum_by(&self, tickers: &[String], field: impl Fn(&Position) -> f64) -> f64 {
        // Sort by ticker before summing for a deterministic floating-point result
        let mut subset: Vec<&String> = tickers.iter().collect();
        subset.sort();
        subset
            .iter()
            .filter_map(|t| self.assets.get(*t))
            .map(field)
            .sum()
    }

    /// Total mark-to-market value across the subset.
    pub fn value(&self, tickers: &[String]) -> f64 {
        self.sum_by(tickers, |p| p.value)
    }

    /// Total unrealized profit across the subset.
    pub fn profits(&self, tickers: &[String]) -> f64 {
        self.sum_by(tickers, |p| p.unrealized_profit())
    }

    /// Total cost basis across the subset.
    pub fn costs(&self, tickers: &[String]) -> f64 {
        self.sum_by(tickers, |p| p.cost)
    }

    /// Net cash flow across the subset.
    pub fn cash(&self, tickers: &[String]) -> f64 {
        self.sum_by(tickers, |p| p.cash)
    }
}
