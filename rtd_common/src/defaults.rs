//! Default identifiers and timings used when the caller does not override them.
use std::time::Duration;

/// Activation identifier of the spreadsheet application hosting the RTD provider.
pub const HOST_APP: &str = "Excel.Application";
/// Program identifier of the RTD provider named in every formula.
pub const PROG_ID: &str = "TradingApp";
/// Default wall-clock budget for the polling phase, in seconds.
pub const TIMEOUT_SECS: f64 = 8.0;
/// Share of data cells that must be filled before polling stops early.
pub const FILL_THRESHOLD: f64 = 0.5;
/// Pause between two polling scans.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Attempts allowed for a single cell call while the host rejects calls.
pub const RETRY_ATTEMPTS: u32 = 40;
/// Pause between two rejected cell calls.
pub const RETRY_DELAY: Duration = Duration::from_millis(50);
/// Label written to the top-left cell above the ticker column.
pub const TICKER_LABEL: &str = "Ticker";
