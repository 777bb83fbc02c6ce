// End-to-end tests: CSV fixtures through replay, metrics, and reporting.
// Run with: cargo test

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::data::{self, PriceTable};
use crate::engine::AccountingEngine;
use crate::error::Error;
use crate::market::MarketSeries;
use crate::metrics::MetricsEngine;
use crate::position::OversellPolicy;
use crate::report::Reporter;
use crate::TradingCalendar;

const TOL: f64 = 1e-9;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

/// Four trading days across a weekend, two tickers, one realized sale.
fn fixture_paths() -> (PathBuf, PathBuf, PathBuf) {
    let prices = write_temp(
        "pt_e2e_prices.csv",
        "Date,AAPL,MSFT\n\
         2020-01-02,100.0,200.0\n\
         2020-01-03,102.0,198.0\n\
         2020-01-06,105.0,204.0\n\
         2020-01-07,110.0,210.0\n",
    );
    let trades = write_temp(
        "pt_e2e_trades.csv",
        "Date,Ticker,Qty,Side\n\
         2020-01-02,AAPL,10,BUY\n\
         2020-01-02,MSFT,5,BUY\n\
         2020-01-06,AAPL,4,SELL\n\
         2020-01-07,MSFT,5,BUY\n",
    );
    let market = write_temp(
        "pt_e2e_market.csv",
        "Date,Open,High,Low,Close,Volume\n\
         2020-01-02,3190,3210,3180,3200.0,100\n\
         2020-01-03,3200,3220,3195,3210.0,100\n\
         2020-01-06,3210,3240,3205,3230.0,100\n\
         2020-01-07,3230,3260,3225,3250.0,100\n",
    );
    (prices, trades, market)
}

fn replay_fixture() -> (crate::History, MarketSeries) {
    let (prices_path, trades_path, market_path) = fixture_paths();
    let prices = PriceTable::from_csv(&prices_path).unwrap();
    let trades = data::load_transactions(&trades_path).unwrap();
    let history = AccountingEngine::new(&prices, OversellPolicy::Reject)
        .replay(&trades)
        .unwrap();
    let market = MarketSeries::fetch_or_fallback(
        None,
        &market_path,
        date(2020, 1, 2),
        date(2020, 1, 7),
    )
    .unwrap();
    (history, market)
}

#[test]
fn replay_produces_expected_final_positions() {
    let (history, _) = replay_fixture();

    let aapl = history.portfolio.position("AAPL").unwrap();
    assert_eq!(aapl.qty, 6);
    assert!((aapl.cost - 600.0).abs() < TOL);
    assert!((aapl.value - 660.0).abs() < TOL);
    assert!((aapl.cash - 420.0).abs() < TOL);

    let msft = history.portfolio.position("MSFT").unwrap();
    assert_eq!(msft.qty, 10);
    assert!((msft.cost - 2050.0).abs() < TOL);
    assert!((msft.value - 2100.0).abs() < TOL);
    assert!((msft.cash - 0.0).abs() < TOL);

    // The Jan 6 sale of 4 AAPL at 105 against an average cost of 100
    let sell = history.ledger.sell_on(date(2020, 1, 6), "AAPL").unwrap();
    assert!((sell.profit - 20.0).abs() < TOL);
    assert!((sell.cost - 400.0).abs() < TOL);
}

#[test]
fn weekend_dates_resolve_to_friday_snapshot() {
    let (history, _) = replay_fixture();
    let saturday = history.snapshots.at_or_before(date(2020, 1, 4)).unwrap();
    let aapl = saturday.position("AAPL").unwrap();
    assert_eq!(aapl.qty, 10);
    assert!((aapl.value - 1020.0).abs() < TOL);
    // Friday and Saturday resolve to the same snapshot
    let friday = history.snapshots.get(date(2020, 1, 3)).unwrap();
    assert_eq!(friday.position("AAPL").unwrap().qty, aapl.qty);
}

#[test]
fn whole_span_profit_breakdown() {
    let (history, market) = replay_fixture();
    let metrics = MetricsEngine::new(&history.ledger, &history.snapshots, &market, 0.02, true);
    let tickers = history.portfolio.tickers();
    let dates = TradingCalendar::enumerate_inclusive(date(2020, 1, 2), date(2020, 1, 7));

    let breakdown = metrics.profit_and_cost(&dates, &tickers).unwrap();
    assert!((breakdown.realized_profit - 20.0).abs() < TOL);
    assert!((breakdown.realized_cost - 400.0).abs() < TOL);
    assert!((breakdown.realized_pct - 5.0).abs() < TOL);
    // AAPL holds 60 unrealized on 600, MSFT 50 on 2050
    assert!((breakdown.unrealized_profit - 110.0).abs() < TOL);
    assert!((breakdown.unrealized_cost - 2650.0).abs() < TOL);
    assert!((breakdown.total_profit - 130.0).abs() < TOL);
    assert!(!breakdown.total_degenerate);
}

#[test]
fn benchmark_self_beta_is_one_over_the_span() {
    let (history, market) = replay_fixture();
    let metrics = MetricsEngine::new(&history.ledger, &history.snapshots, &market, 0.02, true);
    let tickers = history.portfolio.tickers();
    let dates = TradingCalendar::enumerate_inclusive(date(2020, 1, 2), date(2020, 1, 7));

    let (_, market_returns) = metrics.period_returns(&dates, &tickers).unwrap();
    assert_eq!(market_returns.len(), 3);
    let (beta, degenerate) = metrics.beta(&market_returns, &market_returns);
    assert!(!degenerate);
    assert!((beta - 1.0).abs() < TOL);

    // (3250 - 3200) / 3200 * 100
    let market_total = market
        .total_return_pct(date(2020, 1, 2), date(2020, 1, 7))
        .unwrap();
    assert!((market_total - 1.5625).abs() < TOL);
}

#[test]
fn sharpe_and_alpha_are_finite_over_the_span() {
    let (history, market) = replay_fixture();
    let metrics = MetricsEngine::new(&history.ledger, &history.snapshots, &market, 0.02, true);
    let tickers = history.portfolio.tickers();
    let dates = TradingCalendar::enumerate_inclusive(date(2020, 1, 2), date(2020, 1, 7));

    let (returns, _) = metrics.period_returns(&dates, &tickers).unwrap();
    let (sharpe, substituted) = metrics.sharpe_ratio(&returns);
    assert!(sharpe.is_finite());
    assert!(!substituted);

    let alpha = metrics.alpha(&dates, &tickers).unwrap();
    assert!(alpha.is_finite());
}

#[test]
fn oversell_from_file_is_rejected() {
    let (prices_path, _, _) = fixture_paths();
    let trades_path = write_temp(
        "pt_e2e_oversell.csv",
        "Date,Ticker,Qty,Side\n\
         2020-01-02,AAPL,10,BUY\n\
         2020-01-03,AAPL,100,SELL\n",
    );
    let prices = PriceTable::from_csv(&prices_path).unwrap();
    let trades = data::load_transactions(&trades_path).unwrap();
    let result = AccountingEngine::new(&prices, OversellPolicy::Reject).replay(&trades);
    assert!(matches!(
        result,
        Err(Error::Oversell {
            have: 10,
            want: 100,
            ..
        })
    ));
}

#[test]
fn off_calendar_trade_from_file_is_fatal() {
    let (prices_path, _, _) = fixture_paths();
    // Jan 4 is a Saturday, absent from the price table
    let trades_path = write_temp(
        "pt_e2e_offcal.csv",
        "Date,Ticker,Qty,Side\n2020-01-04,AAPL,1,BUY\n",
    );
    let prices = PriceTable::from_csv(&prices_path).unwrap();
    let trades = data::load_transactions(&trades_path).unwrap();
    let result = AccountingEngine::new(&prices, OversellPolicy::Reject).replay(&trades);
    assert!(matches!(result, Err(Error::MalformedInput { .. })));
}

#[test]
fn full_pipeline_writes_reports() {
    let (history, market) = replay_fixture();
    let reporter = Reporter::new(&history, &market, 0.02, true, None);
    let dir = std::env::temp_dir().join("pt_e2e_reports");
    let dir = dir.to_str().unwrap();
    reporter
        .run(date(2020, 1, 2), date(2020, 1, 7), Some(dir))
        .unwrap();
    for name in [
        "profit_2020.csv",
        "profit_summary.csv",
        "profit_summary.json",
        "positions.csv",
    ] {
        assert!(Path::new(&format!("{dir}/{name}")).exists(), "{name} missing");
    }
}
