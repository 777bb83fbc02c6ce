//! Error taxonomy for the tracker.
//!
//! Calendar gaps and malformed input are fatal and surface to the caller with
//! the offending date/ticker. Degenerate statistics (zero variance, zero cost
//! denominators) are not errors: they are substituted locally and flagged in
//! the result, see the metrics module.

use chrono::NaiveDate;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A closest-prior-date lookup found no entry at or before the target.
    #[error("no indexed date at or before {date}")]
    IndexGap { date: NaiveDate },

    /// A transaction dated outside the price calendar, out of order, or
    /// otherwise inconsistent input.
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    /// Sell quantity exceeds the held quantity under the reject policy.
    #[error("cannot sell {want} shares of {ticker}, only {have} held")]
    Oversell {
        ticker: String,
        have: i64,
        want: i64,
    },

    /// The price table has no entry for this date/ticker combination.
    #[error("no price for {ticker} on {date}")]
    MissingPrice { date: NaiveDate, ticker: String },

    /// A date cell that does not parse as YYYY-MM-DD.
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    ParseDate(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a `MalformedInput` with a formatted reason.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedInput {
            reason: reason.into(),
        }
    }
}
