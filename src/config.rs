// Configuration module for the portfolio tracker
// Assembles runtime settings from command-line arguments and environment

use std::env;

use crate::position::OversellPolicy;
use crate::DEFAULT_RISK_FREE_RATE;

/// Runtime configuration for one tracker run.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Wide-format daily price CSV.
    pub prices_file: String,
    /// Transaction ledger CSV.
    pub transactions_file: String,
    /// Optional URL serving the benchmark CSV; the local file is the fallback.
    pub market_url: Option<String>,
    /// Local benchmark CSV.
    pub market_file: String,
    /// Annual risk-free rate used by Sharpe and alpha.
    pub risk_free_rate: f64,
    pub oversell_policy: OversellPolicy,
    /// Keep the legacy benchmark-vs-itself beta inside alpha. See DESIGN.md.
    pub benchmark_self_beta: bool,
    /// Restrict reporting to these tickers; None means the full universe.
    pub tickers_of_interest: Option<Vec<String>>,
    /// Directory for CSV report output; None prints tables only.
    pub output_dir: Option<String>,
}

impl TrackerConfig {
    /// Create configuration from command-line arguments
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prices: Option<String>,
        transactions: Option<String>,
        market_url: Option<String>,
        market_file: Option<String>,
        risk_free: Option<f64>,
        oversell: &str,
        corrected_beta: bool,
        tickers: Option<String>,
        output_dir: Option<String>,
    ) -> Result<Self, String> {
        // Data files default to the directory named by the environment
        let base = env::var("PORTFOLIO_DATA_PATH").unwrap_or_else(|_| String::from("."));

        let oversell_policy = OversellPolicy::from_str(oversell)
            .map_err(|e| format!("Invalid oversell policy: {}", e))?;

        let tickers_of_interest = tickers.map(|t| {
            t.split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            prices_file: prices.unwrap_or_else(|| format!("{}/px_etf.csv", base)),
            transactions_file: transactions.unwrap_or_else(|| format!("{}/tx_etf.csv", base)),
            market_url,
            market_file: market_file.unwrap_or_else(|| format!("{}/gspc.csv", base)),
            risk_free_rate: risk_free.unwrap_or(DEFAULT_RISK_FREE_RATE),
            oversell_policy,
            benchmark_self_beta: !corrected_beta,
            tickers_of_interest,
            output_dir,
        })
    }
}
