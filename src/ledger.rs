//! Append-only, date-indexed record of executed buy and sell events.
//!
//! Buys and sells are stored separately, keyed by (date, ticker). At most one
//! event of each side exists per key: the first insert wins and later ones are
//! ignored, so same-day same-ticker same-side trades must be pre-aggregated by
//! the caller.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One executed buy, at that day's closing price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyEvent {
    pub ticker: String,
    pub price: f64,
    pub qty: i64,
}

impl BuyEvent {
    pub fn cost(&self) -> f64 {
        self.price * self.qty as f64
    }
}

/// One executed sell, with the realized profit and the cost basis consumed at
/// that moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellEvent {
    pub ticker: String,
    pub price: f64,
    pub qty: i64,
    pub profit: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    buys: HashMap<NaiveDate, HashMap<String, BuyEvent>>,
    sells: HashMap<NaiveDate, HashMap<String, SellEvent>>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_buy(&mut self, date: NaiveDate, buy: BuyEvent) {
        self.buys
            .entry(date)
            .or_default()
            .entry(buy.ticker.clone())
            .or_insert(buy);
    }

    pub fn record_sell(&mut self, date: NaiveDate, sell: SellEvent) {
        self.sells
            .entry(date)
            .or_default()
            .entry(sell.ticker.clone())
            .or_insert(sell);
    }

    pub fn buy_on(&self, date: NaiveDate, ticker: &str) -> Option<&BuyEvent> {
        self.buys.get(&date).and_then(|m| m.get(ticker))
    }

    pub fn sell_on(&self, date: NaiveDate, ticker: &str) -> Option<&SellEvent> {
        self.sells.get(&date).and_then(|m| m.get(ticker))
    }

    /// Total realized profit and cost consumed across every sell matching the
    /// given date x ticker cross product.
    pub fn realized_over(&self, dates: &[NaiveDate], tickers: &[String]) -> (f64, f64) {
        let mut profits = 0.0;
        let mut costs = 0.0;
        for date in dates {
            for ticker in tickers {
                if let Some(sell) = self.sell_on(*date, ticker) {
                    profits += sell.profit;
                    costs += sell.cost;
                }
            }
        }
        (profits, costs)
    }
}
