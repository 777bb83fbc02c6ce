//! The accounting engine: a single forward chronological replay of the
//! transaction ledger against the price calendar.
//!
//! For each indexed trading day the engine applies that day's transactions to
//! the live portfolio, marks every ticker to the day's close, and commits an
//! immutable snapshot. After the last price date the live state is frozen
//! into a `History` and everything downstream reads it immutably.

use chrono::NaiveDate;
use log::{debug, info};

use crate::calendar::TradingCalendar;
use crate::data::{PriceTable, Side, TradeRecord};
use crate::error::{Error, Result};
use crate::ledger::{BuyEvent, SellEvent, TradeLedger};
use crate::position::{OversellPolicy, Portfolio};
use crate::snapshot::SnapshotStore;

/// Immutable result of a completed replay.
#[derive(Debug, Clone)]
pub struct History {
    pub portfolio: Portfolio,
    pub ledger: TradeLedger,
    pub snapshots: SnapshotStore,
    pub calendar: TradingCalendar,
}

pub struct AccountingEngine<'a> {
    prices: &'a PriceTable,
    policy: OversellPolicy,
    portfolio: Portfolio,
    ledger: TradeLedger,
    snapshots: SnapshotStore,
}

impl<'a> AccountingEngine<'a> {
    pub fn new(prices: &'a PriceTable, policy: OversellPolicy) -> Self {
        Self {
            prices,
            policy,
            portfolio: Portfolio::new(prices.tickers()),
            ledger: TradeLedger::new(),
            snapshots: SnapshotStore::new(),
        }
    }

    /// Walk the price calendar from the first to the last indexed date,
    /// consuming `trades` (pre-sorted by date ascending) along the way.
    ///
    /// A trade whose date is not in the price calendar, or that appears out
    /// of order, is a fatal `MalformedInput`.
    pub fn replay(mut self, trades: &[TradeRecord]) -> Result<History> {
        let calendar = self.prices.calendar();
        let mut pending = trades.iter().peekable();

        for date in calendar.iter() {
            while let Some(next) = pending.peek() {
                if next.date < date {
                    // Either out of order or dated on a day the price table
                    // does not contain (weekend/holiday/typo).
                    return Err(Error::malformed(format!(
                        "transaction for {} dated {} is not on the price calendar or out of order",
                        next.ticker, next.date
                    )));
                }
                if next.date > date {
                    break;
                }
                let trade = pending.next().expect("peeked entry exists");
                self.process_trade(trade)?;
            }
            self.mark_all(date)?;
            self.snapshots.commit(date, &self.portfolio);
        }

        if let Some(left_over) = pending.next() {
            return Err(Error::malformed(format!(
                "transaction for {} dated {} falls after the last price date",
                left_over.ticker, left_over.date
            )));
        }

        info!(
            "replay complete: {} trading days, {} tickers, {} transactions",
            calendar.len(),
            self.prices.tickers().len(),
            trades.len()
        );
        Ok(History {
            portfolio: self.portfolio,
            ledger: self.ledger,
            snapshots: self.snapshots,
            calendar,
        })
    }

    fn process_trade(&mut self, trade: &TradeRecord) -> Result<()> {
        // Trades always execute at that day's close, never intraday
        let eod_price = self.prices.price(trade.date, &trade.ticker)?;
        debug!(
            "{} {:?} {} x {} @ {:.2}",
            trade.date, trade.side, trade.qty, trade.ticker, eod_price
        );

        let position = self.portfolio.position_mut(&trade.ticker);
        match trade.side {
            Side::Buy => {
                position.apply_buy(eod_price, trade.qty);
                self.ledger.record_buy(
                    trade.date,
                    BuyEvent {
                        ticker: trade.ticker.clone(),
                        price: eod_price,
                        qty: trade.qty,
                    },
                );
            }
            Side::Sell => {
                if self.policy == OversellPolicy::Reject && trade.qty > position.qty {
                    return Err(Error::Oversell {
                        ticker: trade.ticker.clone(),
                        have: position.qty,
                        want: trade.qty,
                    });
                }
                let outcome = position.apply_sell(eod_price, trade.qty);
                self.ledger.record_sell(
                    trade.date,
                    SellEvent {
                        ticker: trade.ticker.clone(),
                        price: eod_price,
                        qty: trade.qty,
                        profit: outcome.profit,
                        cost: outcome.cost_removed,
                    },
                );
            }
        }
        Ok(())
    }

    fn mark_all(&mut self, date: NaiveDate) -> Result<()> {
        for ticker in self.prices.tickers() {
            let price = self.prices.price(date, ticker)?;
            self.portfolio.position_mut(ticker).mark_to_market(price);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_prices() -> PriceTable {
        let mut table = PriceTable::new(vec![]);
        table.set(date(2020, 1, 2), "AAPL", 100.0);
        table.set(date(2020, 1, 2), "MSFT", 200.0);
        table.set(date(2020, 1, 3), "AAPL", 110.0);
        table.set(date(2020, 1, 3), "MSFT", 198.0);
        table.set(date(2020, 1, 6), "AAPL", 105.0);
        table.set(date(2020, 1, 6), "MSFT", 202.0);
        table
    }

    fn trade(y: i32, m: u32, d: u32, ticker: &str, qty: i64, side: Side) -> TradeRecord {
        TradeRecord {
            date: date(y, m, d),
            ticker: ticker.to_string(),
            qty,
            side,
        }
    }

    #[test]
    fn replay_snapshots_every_trading_day() {
        let prices = sample_prices();
        let trades = vec![
            trade(2020, 1, 2, "AAPL", 10, Side::Buy),
            trade(2020, 1, 3, "AAPL", 5, Side::Sell),
        ];
        let history = AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .unwrap();

        assert_eq!(history.snapshots.len(), 3);

        // Day 1: bought 10 at 100, marked at 100
        let day1 = history.snapshots.get(date(2020, 1, 2)).unwrap();
        let aapl = day1.position("AAPL").unwrap();
        assert_eq!(aapl.qty, 10);
        assert!((aapl.cost - 1000.0).abs() < TOL);
        assert!((aapl.value - 1000.0).abs() < TOL);

        // Day 2: sold 5 at 110, realized (110-100)*5
        let sell = history.ledger.sell_on(date(2020, 1, 3), "AAPL").unwrap();
        assert!((sell.profit - 50.0).abs() < TOL);
        assert!((sell.cost - 500.0).abs() < TOL);
        let day2 = history.snapshots.get(date(2020, 1, 3)).unwrap();
        let aapl = day2.position("AAPL").unwrap();
        assert_eq!(aapl.qty, 5);
        assert!((aapl.cost - 500.0).abs() < TOL);
        assert!((aapl.value - 550.0).abs() < TOL);

        // Day 3: no trades, remark at 105
        let day3 = history.snapshots.get(date(2020, 1, 6)).unwrap();
        assert!((day3.position("AAPL").unwrap().value - 525.0).abs() < TOL);

        // Untraded ticker is still marked every day
        assert_eq!(day3.position("MSFT").unwrap().qty, 0);
        assert!(day3.position("MSFT").unwrap().value.abs() < TOL);
    }

    #[test]
    fn transaction_off_calendar_is_fatal() {
        let prices = sample_prices();
        // Jan 4 is a Saturday with no prices
        let trades = vec![trade(2020, 1, 4, "AAPL", 10, Side::Buy)];
        let err = AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn transaction_after_last_price_date_is_fatal() {
        let prices = sample_prices();
        let trades = vec![trade(2020, 2, 1, "AAPL", 10, Side::Buy)];
        let err = AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput { .. }));
    }

    #[test]
    fn out_of_order_transactions_are_fatal() {
        let prices = sample_prices();
        let trades = vec![
            trade(2020, 1, 3, "AAPL", 10, Side::Buy),
            trade(2020, 1, 2, "AAPL", 5, Side::Buy),
        ];
        assert!(AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .is_err());
    }

    #[test]
    fn oversell_rejected_by_default() {
        let prices = sample_prices();
        let trades = vec![
            trade(2020, 1, 2, "AAPL", 5, Side::Buy),
            trade(2020, 1, 3, "AAPL", 8, Side::Sell),
        ];
        let err = AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .unwrap_err();
        match err {
            Error::Oversell { ticker, have, want } => {
                assert_eq!(ticker, "AAPL");
                assert_eq!(have, 5);
                assert_eq!(want, 8);
            }
            other => panic!("expected Oversell, got {other:?}"),
        }
    }

    #[test]
    fn oversell_allowed_goes_negative() {
        let prices = sample_prices();
        let trades = vec![
            trade(2020, 1, 2, "AAPL", 5, Side::Buy),
            trade(2020, 1, 3, "AAPL", 8, Side::Sell),
        ];
        let history = AccountingEngine::new(&prices, OversellPolicy::Allow)
            .replay(&trades)
            .unwrap();
        assert_eq!(history.portfolio.position("AAPL").unwrap().qty, -3);
    }

    #[test]
    fn same_day_duplicate_side_keeps_first_ledger_entry() {
        let prices = sample_prices();
        let trades = vec![
            trade(2020, 1, 2, "AAPL", 10, Side::Buy),
            trade(2020, 1, 2, "AAPL", 3, Side::Buy),
        ];
        let history = AccountingEngine::new(&prices, OversellPolicy::Reject)
            .replay(&trades)
            .unwrap();
        // The portfolio sees both trades, the ledger only the first
        assert_eq!(history.portfolio.position("AAPL").unwrap().qty, 13);
        assert_eq!(history.ledger.buy_on(date(2020, 1, 2), "AAPL").unwrap().qty, 10);
    }
}
