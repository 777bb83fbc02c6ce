//! Input loaders: the wide-format daily price table and the transaction
//! ledger CSV.
//!
//! Price file layout: first column `Date` (YYYY-MM-DD), one column per ticker
//! holding that day's close. Transaction file layout: `date,ticker,qty,side`
//! with side `BUY` or `SELL`, pre-sorted by date ascending.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::calendar::TradingCalendar;
use crate::error::{Error, Result};

/// Order side of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(Error::malformed(format!("unknown order side '{other}'"))),
        }
    }
}

/// One raw transaction as read from the ledger file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub ticker: String,
    pub qty: i64,
    pub side: Side,
}

/// Daily close prices keyed date -> ticker -> price.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    tickers: Vec<String>,
    prices: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl PriceTable {
    pub fn new(tickers: Vec<String>) -> Self {
        Self {
            tickers,
            prices: BTreeMap::new(),
        }
    }

    /// Load the wide-format price CSV. Malformed rows are skipped with a
    /// warning rather than aborting the load.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let tickers: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut prices = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            match parse_price_row(&record, &tickers) {
                Ok((date, row)) => {
                    prices.insert(date, row);
                }
                Err(e) => warn!("skipping price row {:?}: {}", record, e),
            }
        }
        Ok(Self { tickers, prices })
    }

    /// End-of-day price for `ticker` on `date`.
    pub fn price(&self, date: NaiveDate, ticker: &str) -> Result<f64> {
        self.prices
            .get(&date)
            .and_then(|row| row.get(ticker))
            .copied()
            .ok_or_else(|| Error::MissingPrice {
                date,
                ticker: ticker.to_string(),
            })
    }

    pub fn set(&mut self, date: NaiveDate, ticker: &str, price: f64) {
        if !self.tickers.iter().any(|t| t == ticker) {
            self.tickers.push(ticker.to_string());
        }
        self.prices
            .entry(date)
            .or_default()
            .insert(ticker.to_string(), price);
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.prices.keys().copied()
    }

    /// Trading calendar over the dates this table contains.
    pub fn calendar(&self) -> TradingCalendar {
        TradingCalendar::from_dates(self.dates())
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

fn parse_price_row(
    record: &csv::StringRecord,
    tickers: &[String],
) -> Result<(NaiveDate, HashMap<String, f64>)> {
    let date = parse_date(record.get(0).unwrap_or(""))?;
    let mut row = HashMap::with_capacity(tickers.len());
    for (i, ticker) in tickers.iter().enumerate() {
        let cell = record
            .get(i + 1)
            .ok_or_else(|| Error::malformed(format!("missing price cell for {ticker}")))?;
        let price: f64 = cell
            .trim()
            .parse()
            .map_err(|_| Error::malformed(format!("bad price '{cell}' for {ticker}")))?;
        row.insert(ticker.clone(), price);
    }
    Ok((date, row))
}

/// Parse a YYYY-MM-DD cell.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| Error::ParseDate(s.to_string()))
}

/// Load the transaction ledger. Unlike the price loader this one is strict: a
/// bad row is a fatal `MalformedInput`, since silently dropping a trade would
/// corrupt the accounting that follows.
pub fn load_transactions(path: &Path) -> Result<Vec<TradeRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut trades = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date = parse_date(record.get(0).unwrap_or(""))?;
        let ticker = record
            .get(1)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::malformed(format!("missing ticker on {date}")))?;
        let qty_cell = record.get(2).unwrap_or("");
        let qty: i64 = qty_cell
            .trim()
            .parse()
            .map_err(|_| Error::malformed(format!("bad quantity '{qty_cell}' for {ticker} on {date}")))?;
        if qty <= 0 {
            return Err(Error::malformed(format!(
                "non-positive quantity {qty} for {ticker} on {date}"
            )));
        }
        let side = Side::parse(record.get(3).unwrap_or(""))?;
        trades.push(TradeRecord {
            date,
            ticker,
            qty,
            side,
        });
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_wide_price_table() {
        let path = write_temp(
            "pt_prices_basic.csv",
            "Date,AAPL,MSFT\n2020-01-02,100.0,200.0\n2020-01-03,110.0,195.5\n",
        );
        let table = PriceTable::from_csv(&path).unwrap();
        assert_eq!(table.tickers(), &["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(table.len(), 2);
        assert!((table.price(date(2020, 1, 3), "MSFT").unwrap() - 195.5).abs() < 1e-9);
        assert!(matches!(
            table.price(date(2020, 1, 4), "AAPL"),
            Err(Error::MissingPrice { .. })
        ));
    }

    #[test]
    fn malformed_price_row_is_skipped() {
        let path = write_temp(
            "pt_prices_malformed.csv",
            "Date,AAPL\n2020-01-02,100.0\nnot-a-date,1.0\n2020-01-03,n/a\n2020-01-06,105.0\n",
        );
        let table = PriceTable::from_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.price(date(2020, 1, 6), "AAPL").is_ok());
    }

    #[test]
    fn loads_transactions() {
        let path = write_temp(
            "pt_tx_basic.csv",
            "date,ticker,qty,side\n2020-01-02,AAPL,10,BUY\n2020-01-03,AAPL,5,SELL\n",
        );
        let trades = load_transactions(&path).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Buy);
        assert_eq!(trades[1].side, Side::Sell);
        assert_eq!(trades[1].qty, 5);
        assert_eq!(trades[0].date, date(2020, 1, 2));
    }

    #[test]
    fn bad_transaction_is_fatal() {
        let path = write_temp(
            "pt_tx_bad_side.csv",
            "date,ticker,qty,side\n2020-01-02,AAPL,10,HOLD\n",
        );
        assert!(load_transactions(&path).is_err());

        let path = write_temp(
            "pt_tx_bad_qty.csv",
            "date,ticker,qty,side\n2020-01-02,AAPL,0,BUY\n",
        );
        assert!(load_transactions(&path).is_err());
    }
}
