//! Benchmark market series: date-indexed closing prices for the comparison
//! index, fetched over HTTP with a local CSV fallback.
//!
//! The fetched/fallback CSV must carry a `Date` column and a `Close` column
//! (additional columns are ignored, so a raw OHLCV export works as-is).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use log::{info, warn};

use crate::data::parse_date;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct MarketSeries {
    closes: BTreeMap<NaiveDate, f64>,
}

impl MarketSeries {
    pub fn from_closes(closes: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        Self {
            closes: closes.into_iter().collect(),
        }
    }

    /// Fetch the series from `url` when given, falling back to the local CSV
    /// at `fallback` when the fetch fails or yields no rows. The result is
    /// clipped to `start..=end`.
    pub fn fetch_or_fallback(
        url: Option<&str>,
        fallback: &Path,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        if let Some(url) = url {
            match Self::fetch(url) {
                Ok(series) if !series.is_empty() => {
                    info!("market series fetched from {url}: {} rows", series.len());
                    return Ok(series.clipped(start, end));
                }
                Ok(_) => warn!("market feed at {url} returned no rows, using {fallback:?}"),
                Err(e) => warn!("market fetch from {url} failed ({e}), using {fallback:?}"),
            }
        }
        let series = Self::from_csv_path(fallback)?;
        info!("market series loaded from {fallback:?}: {} rows", series.len());
        Ok(series.clipped(start, end))
    }

    fn fetch(url: &str) -> Result<Self> {
        let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
        Self::from_reader(csv::Reader::from_reader(body.as_bytes()))
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        Self::from_reader(csv::Reader::from_path(path)?)
    }

    fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let headers = reader.headers()?.clone();
        let close_idx = headers
            .iter()
            .position(|h| h.trim() == "Close")
            .ok_or_else(|| Error::malformed("market CSV has no 'Close' column"))?;

        let mut closes = BTreeMap::new();
        for record in reader.records() {
            let record = record?;
            let date_cell = record.get(0).unwrap_or("");
            let close_cell = record.get(close_idx).unwrap_or("");
            // yfinance exports carry a timestamp suffix on some rows
            let parsed = parse_date(date_cell.split_whitespace().next().unwrap_or(""))
                .and_then(|date| {
                    close_cell
                        .trim()
                        .parse::<f64>()
                        .map(|close| (date, close))
                        .map_err(|_| Error::malformed(format!("bad close '{close_cell}'")))
                });
            match parsed {
                Ok((date, close)) => {
                    closes.insert(date, close);
                }
                Err(e) => warn!("skipping market row {:?}: {}", record, e),
            }
        }
        Ok(Self { closes })
    }

    fn clipped(self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            closes: self
                .closes
                .into_iter()
                .filter(|(date, _)| *date >= start && *date <= end)
                .collect(),
        }
    }

    /// Close on exactly `date`, if the benchmark traded that day.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.closes.get(&date).copied()
    }

    /// Percentage change between the first and last closes inside
    /// `start..=end`.
    pub fn total_return_pct(&self, start: NaiveDate, end: NaiveDate) -> Result<f64> {
        let first = self
            .closes
            .range(start..=end)
            .next()
            .map(|(_, c)| *c)
            .ok_or(Error::IndexGap { date: start })?;
        let last = self
            .closes
            .range(start..=end)
            .next_back()
            .map(|(_, c)| *c)
            .ok_or(Error::IndexGap { date: end })?;
        Ok((last - first) / first * 100.0)
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
