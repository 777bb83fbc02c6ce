use std::path::Path;
use std::process;

use clap::Parser;
use log::{debug, info};

use portfolio_tracker::data::{self, PriceTable};
use portfolio_tracker::engine::AccountingEngine;
use portfolio_tracker::error::{Error, Result};
use portfolio_tracker::market::MarketSeries;
use portfolio_tracker::report::Reporter;
use portfolio_tracker::TrackerConfig;

/// Portfolio tracker: replays a transaction ledger against daily prices and
/// reports profits and risk statistics against a market benchmark.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Wide-format daily price CSV (date column, one column per ticker)
    #[arg(short, long)]
    prices: Option<String>,

    /// Transaction CSV: date,ticker,qty,side
    #[arg(short, long)]
    transactions: Option<String>,

    /// URL serving the benchmark CSV; the local file is the fallback
    #[arg(long)]
    market_url: Option<String>,

    /// Local benchmark close-price CSV
    #[arg(short, long)]
    market_file: Option<String>,

    /// Annual risk-free rate
    #[arg(short, long)]
    risk_free: Option<f64>,

    /// What to do when a sell exceeds the held quantity: 'reject' or 'allow'
    #[arg(long, default_value = "reject")]
    oversell: String,

    /// Use portfolio-vs-benchmark beta inside alpha instead of the legacy
    /// benchmark-vs-itself term
    #[arg(long)]
    corrected_beta: bool,

    /// Comma-separated tickers to report on (default: every priced ticker)
    #[arg(long)]
    tickers: Option<String>,

    /// Directory for CSV report output
    #[arg(short, long)]
    output: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(config: &TrackerConfig) -> Result<()> {
    let prices = PriceTable::from_csv(Path::new(&config.prices_file))?;
    info!(
        "loaded {} price rows for {} tickers",
        prices.len(),
        prices.tickers().len()
    );
    let trades = data::load_transactions(Path::new(&config.transactions_file))?;
    info!("loaded {} transactions", trades.len());

    let engine = AccountingEngine::new(&prices, config.oversell_policy);
    let history = engine.replay(&trades)?;

    let start = history
        .calendar
        .first()
        .ok_or_else(|| Error::malformed("price table is empty"))?;
    let end = history
        .calendar
        .last()
        .ok_or_else(|| Error::malformed("price table is empty"))?;
    debug!("replayed {start} through {end}");

    let market = MarketSeries::fetch_or_fallback(
        config.market_url.as_deref(),
        Path::new(&config.market_file),
        start,
        end,
    )?;

    let reporter = Reporter::new(
        &history,
        &market,
        config.risk_free_rate,
        config.benchmark_self_beta,
        config.tickers_of_interest.clone(),
    );
    reporter.run(start, end, config.output_dir.as_deref())
}

fn main() {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match TrackerConfig::new(
        args.prices,
        args.transactions,
        args.market_url,
        args.market_file,
        args.risk_free,
        &args.oversell,
        args.corrected_beta,
        args.tickers,
        args.output,
    ) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run(&config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
