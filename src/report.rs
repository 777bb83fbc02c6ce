//! Report generation: monthly, annual, and whole-span profit tables with the
//! risk statistics alongside, printed to the console and optionally saved as
//! CSV files.

use std::fs::File;

use chrono::{Datelike, NaiveDate};
use log::info;
use polars::prelude::*;

use crate::calendar::TradingCalendar;
use crate::engine::History;
use crate::error::{Error, Result};
use crate::market::MarketSeries;
use crate::metrics::{std_dev, MetricsEngine};

/// One rendered table row: a month, an annual total, or the whole-span sum.
#[derive(Debug, Clone)]
struct ReportRow {
    label: String,
    realized_profit: f64,
    realized_pct: f64,
    unrealized_profit: f64,
    unrealized_pct: f64,
    total_profit: f64,
    total_pct: f64,
    cash: f64,
    portfolio: f64,
    assets: f64,
    std: f64,
    beta: f64,
    alpha: f64,
    sharpe: f64,
    /// Degenerate-statistic substitutions that fired for this row.
    flags: String,
}

pub struct Reporter<'a> {
    history: &'a History,
    metrics: MetricsEngine<'a>,
    tickers: Vec<String>,
}

impl<'a> Reporter<'a> {
    pub fn new(
        history: &'a History,
        market: &'a MarketSeries,
        risk_free_rate: f64,
        benchmark_self_beta: bool,
        tickers_of_interest: Option<Vec<String>>,
    ) -> Self {
        let tickers = tickers_of_interest.unwrap_or_else(|| history.portfolio.tickers());
        let metrics = MetricsEngine::new(
            &history.ledger,
            &history.snapshots,
            market,
            risk_free_rate,
            benchmark_self_beta,
        );
        Self {
            history,
            metrics,
            tickers,
        }
    }

    /// Print one table per year plus a whole-span summary, saving each as CSV
    /// when `output_dir` is set.
    pub fn run(&self, start: NaiveDate, end: NaiveDate, output_dir: Option<&str>) -> Result<()> {
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir)?;
        }
        // Clamp to the snapshotted span
        let end = self.history.calendar.closest_at_or_before(end)?;

        for year in start.year()..=end.year() {
            let mut rows = Vec::new();
            for month in 1..=12u32 {
                let Some(first) = self
                    .history
                    .calendar
                    .iter()
                    .find(|d| d.year() == year && d.month() == month)
                else {
                    continue;
                };
                if first < start || first > end {
                    continue;
                }
                let dates = TradingCalendar::enumerate_inclusive(first, month_end(year, month));
                rows.push(self.row(&dates, month.to_string())?);
            }
            if rows.is_empty() {
                continue;
            }
            let annual_dates = self.history.calendar.dates_in_year(year)?;
            rows.push(self.row(&annual_dates, "Annual".to_string())?);

            let df = rows_to_frame(&rows)?;
            println!("\n{year}");
            println!("{df}");
            if let Some(dir) = output_dir {
                save_frame(&df, &format!("{}/profit_{}.csv", dir, year))?;
            }
        }

        let span_dates = TradingCalendar::enumerate_inclusive(start, end);
        let summary = rows_to_frame(&[self.row(&span_dates, "Sum".to_string())?])?;
        println!("\nFrom {start} to {end}");
        println!("{summary}");
        if let Some(dir) = output_dir {
            save_frame(&summary, &format!("{}/profit_summary.csv", dir))?;
            self.save_positions_csv(&format!("{}/positions.csv", dir))?;
            // Machine-readable copy of the whole-span breakdown
            let breakdown = self.metrics.profit_and_cost(&span_dates, &self.tickers)?;
            let file = File::create(format!("{}/profit_summary.json", dir))?;
            serde_json::to_writer_pretty(file, &breakdown)?;
            info!("reports saved to {dir}");
        }
        Ok(())
    }

    fn row(&self, dates: &[NaiveDate], label: String) -> Result<ReportRow> {
        let last = *dates
            .last()
            .ok_or_else(|| Error::malformed("empty report range"))?;
        let breakdown = self.metrics.profit_and_cost(dates, &self.tickers)?;

        let inventory = self.history.snapshots.at_or_before(last)?;
        let cash = inventory.cash(&self.tickers);
        let portfolio = inventory.value(&self.tickers);

        let (returns, market_returns) = self.metrics.period_returns(dates, &self.tickers)?;
        let std = std_dev(&returns);
        let (beta, beta_defaulted) = self.metrics.beta(&returns, &market_returns);
        let alpha = self.metrics.alpha(dates, &self.tickers)?;
        let (sharpe, sharpe_substituted) = self.metrics.sharpe_ratio(&returns);

        let mut flags = Vec::new();
        if breakdown.total_degenerate {
            flags.push("pct-defaulted");
        }
        if beta_defaulted {
            flags.push("beta-defaulted");
        }
        if sharpe_substituted {
            flags.push("sharpe-std1");
        }

        Ok(ReportRow {
            label,
            realized_profit: breakdown.realized_profit,
            realized_pct: breakdown.realized_pct,
            unrealized_profit: breakdown.unrealized_profit,
            unrealized_pct: breakdown.unrealized_pct,
            total_profit: breakdown.total_profit,
            total_pct: breakdown.total_pct,
            cash,
            portfolio,
            assets: cash + portfolio,
            std,
            beta,
            alpha,
            sharpe,
            flags: flags.join(","),
        })
    }

    /// Final portfolio positions, one row per reported ticker.
    fn save_positions_csv(&self, path: &str) -> Result<()> {
        // Sort by ticker for deterministic output
        let mut tickers = self.tickers.clone();
        tickers.sort();
        let positions: Vec<_> = tickers
            .iter()
            .filter_map(|t| self.history.portfolio.position(t).map(|p| (t.clone(), p)))
            .collect();

        let names: Vec<String> = positions.iter().map(|(t, _)| t.clone()).collect();
        let qty: Vec<i64> = positions.iter().map(|(_, p)| p.qty).collect();
        let avg_price: Vec<f64> = positions.iter().map(|(_, p)| p.avg_price()).collect();
        let cost: Vec<f64> = positions.iter().map(|(_, p)| p.cost).collect();
        let value: Vec<f64> = positions.iter().map(|(_, p)| p.value).collect();
        let unrealized: Vec<f64> = positions
            .iter()
            .map(|(_, p)| p.unrealized_profit())
            .collect();
        let cash: Vec<f64> = positions.iter().map(|(_, p)| p.cash).collect();

        let df = df! {
            "ticker" => names,
            "qty" => qty,
            "avg_price" => avg_price,
            "cost" => cost,
            "value" => value,
            "unrealized_profit" => unrealized,
            "cash" => cash,
        }?;

        save_frame(&df, path)
    }
}

fn rows_to_frame(rows: &[ReportRow]) -> Result<DataFrame> {
    let labels: Vec<String> = rows.iter().map(|r| r.label.clone()).collect();
    let flags: Vec<String> = rows.iter().map(|r| r.flags.clone()).collect();

    let df = df! {
        "Month" => labels,
        "Realized profits" => rows.iter().map(|r| r.realized_profit).collect::<Vec<_>>(),
        "Realized %" => rows.iter().map(|r| r.realized_pct).collect::<Vec<_>>(),
        "Unrealized profits" => rows.iter().map(|r| r.unrealized_profit).collect::<Vec<_>>(),
        "Unrealized %" => rows.iter().map(|r| r.unrealized_pct).collect::<Vec<_>>(),
        "Total profits" => rows.iter().map(|r| r.total_profit).collect::<Vec<_>>(),
        "Total %" => rows.iter().map(|r| r.total_pct).collect::<Vec<_>>(),
        "Cash" => rows.iter().map(|r| r.cash).collect::<Vec<_>>(),
        "Portfolio" => rows.iter().map(|r| r.portfolio).collect::<Vec<_>>(),
        "Assets" => rows.iter().map(|r| r.assets).collect::<Vec<_>>(),
        "Std" => rows.iter().map(|r| r.std).collect::<Vec<_>>(),
        "Beta" => rows.iter().map(|r| r.beta).collect::<Vec<_>>(),
        "Alpha" => rows.iter().map(|r| r.alpha).collect::<Vec<_>>(),
        "Sharpe Ratio" => rows.iter().map(|r| r.sharpe).collect::<Vec<_>>(),
        "Flags" => flags,
    }?;
    Ok(df)
}

fn save_frame(df: &DataFrame, path: &str) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df.clone())?;
    Ok(())
}

/// Last calendar day of the given month.
fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month exists")
        .pred_opt()
        .expect("previous day exists")
}
