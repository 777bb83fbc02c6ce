//! Date-indexed archive of immutable portfolio copies, one per trading day.
//!
//! Snapshots are never mutated after commit; they are the only queryable
//! history of portfolio state once the replay has finished.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::position::Portfolio;

#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: BTreeMap<NaiveDate, Portfolio>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an independent copy of `portfolio` for `date`. Re-committing the
    /// same date is a no-op: the first commit wins.
    pub fn commit(&mut self, date: NaiveDate, portfolio: &Portfolio) {
        self.snapshots
            .entry(date)
            .or_insert_with(|| portfolio.clone());
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Portfolio> {
        self.snapshots.get(&date)
    }

    /// Snapshot for the latest committed date at or before `date`. Used for
    /// query dates that may fall on non-trading days.
    pub fn at_or_before(&self, date: NaiveDate) -> Result<&Portfolio> {
        self.snapshots
            .range(..=date)
            .next_back()
            .map(|(_, portfolio)| portfolio)
            .ok_or(Error::IndexGap { date })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.snapshots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
