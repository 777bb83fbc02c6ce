//! Pure aggregation and statistics over the frozen trade/snapshot history and
//! the benchmark series.
//!
//! Degenerate denominators never raise: a percentage over a near-zero cost is
//! defined as 0, a zero-volatility Sharpe substitutes 1 for the standard
//! deviation, and a zero-variance beta defaults to 0. Each substitution sets
//! a diagnostic flag in the result so reporting can tell a real zero from a
//! defaulted one.

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ledger::TradeLedger;
use crate::market::MarketSeries;
use crate::snapshot::SnapshotStore;
use crate::EPS;

/// Profit/cost aggregation over a date range and ticker subset.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ProfitBreakdown {
    pub realized_profit: f64,
    pub realized_cost: f64,
    pub realized_pct: f64,
    pub unrealized_profit: f64,
    pub unrealized_cost: f64,
    pub unrealized_pct: f64,
    pub total_profit: f64,
    pub total_cost: f64,
    pub total_pct: f64,
    /// Set when the corresponding cost fell at or below the epsilon and the
    /// percentage was defaulted to zero.
    pub realized_degenerate: bool,
    pub unrealized_degenerate: bool,
    pub total_degenerate: bool,
}

pub struct MetricsEngine<'a> {
    ledger: &'a TradeLedger,
    snapshots: &'a SnapshotStore,
    market: &'a MarketSeries,
    risk_free_rate: f64,
    /// Compute alpha's beta term as benchmark-vs-itself, the way the legacy
    /// report always did. See DESIGN.md; with a consistent estimator this
    /// term is identically 1 whenever the benchmark moved at all.
    benchmark_self_beta: bool,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(
        ledger: &'a TradeLedger,
        snapshots: &'a SnapshotStore,
        market: &'a MarketSeries,
        risk_free_rate: f64,
        benchmark_self_beta: bool,
    ) -> Self {
        Self {
            ledger,
            snapshots,
            market,
            risk_free_rate,
            benchmark_self_beta,
        }
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Realized figures sum the ledger's sells over `dates`; unrealized
    /// figures read the snapshot at or before the last date in `dates`.
    pub fn profit_and_cost(
        &self,
        dates: &[NaiveDate],
        tickers: &[String],
    ) -> Result<ProfitBreakdown> {
        let last = *dates
            .last()
            .ok_or_else(|| Error::malformed("empty date range"))?;
        let (realized_profit, realized_cost) = self.ledger.realized_over(dates, tickers);

        let inventory = self.snapshots.at_or_before(last)?;
        let unrealized_profit = inventory.profits(tickers);
        let unrealized_cost = inventory.costs(tickers);

        let total_profit = realized_profit + unrealized_profit;
        let total_cost = realized_cost + unrealized_cost;

        let (realized_pct, realized_degenerate) = pct(realized_profit, realized_cost);
        let (unrealized_pct, unrealized_degenerate) = pct(unrealized_profit, unrealized_cost);
        let (total_pct, total_degenerate) = pct(total_profit, total_cost);

        Ok(ProfitBreakdown {
            realized_profit,
            realized_cost,
            realized_pct,
            unrealized_profit,
            unrealized_cost,
            unrealized_pct,
            total_profit,
            total_cost,
            total_pct,
            realized_degenerate,
            unrealized_degenerate,
            total_degenerate,
        })
    }

    /// Aligned per-period return series for the portfolio and the benchmark.
    ///
    /// Walks `dates` in order, retaining only the dates that have both a
    /// snapshot and a benchmark close; for each consecutive retained pair the
    /// portfolio contributes its total percentage return over the pair and
    /// the benchmark its raw price delta. Dates lacking coverage are skipped,
    /// not padded.
    pub fn period_returns(
        &self,
        dates: &[NaiveDate],
        tickers: &[String],
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let mut portfolio_returns = Vec::new();
        let mut market_returns = Vec::new();
        let mut prev: Option<(NaiveDate, f64)> = None;

        for &date in dates {
            if self.snapshots.get(date).is_none() {
                continue;
            }
            let Some(market_now) = self.market.close_on(date) else {
                continue;
            };
            if let Some((prev_date, market_prev)) = prev {
                let breakdown = self.profit_and_cost(&[prev_date, date], tickers)?;
                portfolio_returns.push(breakdown.total_pct);
                market_returns.push(market_now - market_prev);
            }
            prev = Some((date, market_now));
        }
        Ok((portfolio_returns, market_returns))
    }

    /// Covariance-over-variance beta with a degenerate-reference fallback of
    /// 0. The returned flag reports whether the fallback fired.
    pub fn beta(&self, returns: &[f64], reference: &[f64]) -> (f64, bool) {
        let var = variance(reference);
        if var <= EPS {
            warn!("reference series has zero variance, beta defaulted to 0");
            return (0.0, true);
        }
        (covariance(returns, reference) / var, false)
    }

    /// Excess return per unit of volatility. Zero volatility substitutes 1
    /// for the standard deviation instead of failing; the flag reports the
    /// substitution.
    pub fn sharpe_ratio(&self, returns: &[f64]) -> (f64, bool) {
        let avg = mean(returns);
        let mut volatility = std_dev(returns);
        let substituted = volatility == 0.0;
        if substituted {
            warn!("std is zero, cannot calculate Sharpe ratio; used 1 for std instead");
            volatility = 1.0;
        }
        ((avg - self.risk_free_rate) / volatility, substituted)
    }

    /// Alpha = R - R_f - beta * (R_m - R_f), where R is the portfolio's total
    /// percentage return over `dates` and R_m the benchmark's close-to-close
    /// percentage change over the same window.
    pub fn alpha(&self, dates: &[NaiveDate], tickers: &[String]) -> Result<f64> {
        let first = *dates
            .first()
            .ok_or_else(|| Error::malformed("empty date range"))?;
        let last = *dates
            .last()
            .ok_or_else(|| Error::malformed("empty date range"))?;

        let (portfolio_returns, market_returns) = self.period_returns(dates, tickers)?;
        let (beta, _) = if self.benchmark_self_beta {
            self.beta(&market_returns, &market_returns)
        } else {
            self.beta(&portfolio_returns, &market_returns)
        };

        let market_total = self.market.total_return_pct(first, last)?;
        let breakdown = self.profit_and_cost(dates, tickers)?;
        Ok(breakdown.total_pct
            - self.risk_free_rate
            - beta * (market_total - self.risk_free_rate))
    }
}

fn pct(profit: f64, cost: f64) -> (f64, bool) {
    if cost > EPS {
        (profit / cost * 100.0, false)
    } else {
        (0.0, true)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = mean(values);
    values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Population covariance; zero for mismatched or empty inputs.
pub fn covariance(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n == 0 {
        return 0.0;
    }
    let mx = mean(&x[..n]);
    let my = mean(&y[..n]);
    x[..n]
        .iter()
        .zip(&y[..n])
        .map(|(a, b)| (a - mx) * (b - my))
        .sum::<f64>()
        / n as f64
}
