//! Command-line arguments for the snapshot tool.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use rtd_common::defaults;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// RTD provider program identifier used in every formula.
    #[clap(long, env = "PROGID", default_value = defaults::PROG_ID)]
    pub prog_id: String,

    /// Activation identifier of the spreadsheet application.
    #[clap(long, env = "RTD_HOST_APP", default_value = defaults::HOST_APP)]
    pub host_app: String,

    /// Comma-separated tickers, e.g. `AAPL,MSFT`.
    #[clap(long, required_unless_present = "tickers_file")]
    pub tickers: Option<String>,

    /// File with tickers separated by commas, spaces, or new lines.
    #[clap(long, conflicts_with = "tickers")]
    pub tickers_file: Option<String>,

    /// Comma-separated fields, e.g. `Bid,Ask`.
    #[clap(long)]
    pub fields: String,

    /// Seconds to wait for the feed before the final read.
    #[clap(long, env = "RTD_TIMEOUT", default_value_t = defaults::TIMEOUT_SECS)]
    pub timeout: f64,

    /// Share of cells that ends the wait early once filled.
    #[clap(long, default_value_t = defaults::FILL_THRESHOLD)]
    pub fill_threshold: f64,

    /// Pause between two polling scans, in milliseconds.
    #[clap(long, default_value_t = 200)]
    pub poll_interval_ms: u64,

    /// Attempts per cell call while the host rejects calls.
    #[clap(long, default_value_t = defaults::RETRY_ATTEMPTS)]
    pub retries: u32,

    /// Pause between two rejected cell calls, in milliseconds.
    #[clap(long, default_value_t = 50)]
    pub retry_delay_ms: u64,

    /// Indent the JSON output.
    #[clap(long)]
    pub pretty: bool,

    /// Read from the built-in simulated feed instead of the spreadsheet application.
    ///
    /// Values are random-walk test data, never real quotes.
    #[clap(long)]
    pub simulate: bool,

    /// Simulated feed: delay before the first published value, in milliseconds [default: 300].
    #[clap(long, requires = "simulate")]
    pub feed_delay_ms: Option<u64>,

    /// Simulated feed: tickers (`AAPL`) or topics (`AAPL:Bid`) that never publish.
    #[clap(long, value_delimiter = ',', requires = "simulate")]
    pub feed_quiet: Vec<String>,
}
