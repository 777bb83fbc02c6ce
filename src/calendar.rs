//! Trading calendar over the dates the price table actually contains.
//!
//! The price universe is sparse (weekends and holidays are absent), so every
//! as-of query resolves through `closest_at_or_before`: a binary search for
//! the largest indexed date less than or equal to the target.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Ordered set of indexed trading dates.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dates(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, date: NaiveDate) {
        self.dates.insert(date);
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// First indexed date, if any.
    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.iter().next().copied()
    }

    /// Last indexed date, if any.
    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.iter().next_back().copied()
    }

    /// Chronological iteration over the indexed dates.
    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }

    /// Latest indexed date at or before `date`. Fails with `IndexGap` when the
    /// calendar has no entry that early, e.g. a query before the first index
    /// entry.
    pub fn closest_at_or_before(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.dates
            .range(..=date)
            .next_back()
            .copied()
            .ok_or(Error::IndexGap { date })
    }

    /// Every calendar day from `start` through `end` inclusive. This is the
    /// full calendar, weekends and holidays included; downstream lookups
    /// tolerate the non-trading days.
    pub fn enumerate_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut day = start;
        while day <= end {
            dates.push(day);
            day = match day.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        dates
    }

    /// All calendar days from the first indexed date of `year` through the
    /// closest indexed date at or before Dec 31 of that year.
    pub fn dates_in_year(&self, year: i32) -> Result<Vec<NaiveDate>> {
        let first = self
            .iter()
            .find(|d| d.year() == year)
            .ok_or(Error::IndexGap {
                date: year_end(year),
            })?;
        let last = self.closest_at_or_before(year_end(year))?;
        Ok(Self::enumerate_inclusive(first, last))
    }
}

fn year_end(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 12, 31).expect("Dec 31 exists in every year")
}
