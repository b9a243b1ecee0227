//! RTD snapshot tool — takes one snapshot of real-time quote values and prints
//! it as JSON `{ticker: {field: value|null}}` on stdout.
//!
//! It builds a request from the command line (tickers, fields, provider id and
//! timeout), drives the automation host through the snapshot protocol, and
//! reports failures as a JSON diagnostic on stderr with a non-zero exit code.
//! On Windows the spreadsheet application is driven through COM
//! (`rtd_com::ComConnector`). `--simulate` swaps in the built-in simulated
//! feed (`rtd_feed::SimulatedConnector`), which publishes test data only.
//!
//! Usage example (CLI):
//! ```bash
//! rtd_snapshot --tickers AAPL,MSFT --fields Bid,Ask --timeout 8
//! rtd_snapshot --simulate --tickers AAPL --fields Bid --feed-quiet AAPL:Bid
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG`.
#![warn(missing_docs)]
mod args;
mod output;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::args::Args;
use crate::output::{Diagnostic, DiagnosticArgs, render_result};
use clap::Parser;
use log::{error, info};
#[cfg(not(windows))]
use rtd_common::HostCallError;
#[cfg(not(windows))]
use rtd_common::error::REGDB_E_CLASSNOTREG;
use rtd_common::request::ListParser;
use rtd_common::retry::RetryPolicy;
use rtd_common::{
    Field, Result, Snapshot, SnapshotError, SnapshotOptions, SnapshotRequest, Ticker,
};
use rtd_feed::{FeedConfig, SimulatedConnector};

/// Default delay of the simulated feed before its first value.
const FEED_DELAY_MS: u64 = 300;

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse();
    let diagnostic_args = DiagnosticArgs {
        host_app: args.host_app.clone(),
        prog_id: args.prog_id.clone(),
        tickers: args
            .tickers
            .clone()
            .or_else(|| args.tickers_file.clone())
            .unwrap_or_default(),
        fields: args.fields.clone(),
        timeout: args.timeout,
    };

    match run(&args) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Snapshot failed: {}", e);
            eprintln!("{}", Diagnostic::new(&e, diagnostic_args).to_json());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<String> {
    let request = build_request(args)?;
    let options = SnapshotOptions {
        fill_threshold: args.fill_threshold,
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        retry: RetryPolicy::new(args.retries, Duration::from_millis(args.retry_delay_ms)),
    };
    info!(
        "Snapshot of {} tickers x {} fields from `{}` (timeout {:?})",
        request.tickers.len(),
        request.fields.len(),
        request.prog_id,
        request.timeout
    );

    let snapshot = if args.simulate {
        info!("Reading from the simulated feed, values are test data");
        rtd_common::take_snapshot(simulated_connector(args), &request, &options)?
    } else {
        host_snapshot(&request, &options)?
    };
    render_result(&snapshot.values, args.pretty)
}

#[cfg(windows)]
fn host_snapshot(request: &SnapshotRequest, options: &SnapshotOptions) -> Result<Snapshot> {
    rtd_common::take_snapshot(rtd_com::ComConnector::new(), request, options)
}

#[cfg(not(windows))]
fn host_snapshot(request: &SnapshotRequest, _options: &SnapshotOptions) -> Result<Snapshot> {
    Err(SnapshotError::HostUnavailable {
        host_app: request.host_app.clone(),
        attempts: 0,
        last: HostCallError::failed(
            "activate",
            REGDB_E_CLASSNOTREG,
            "COM automation needs Windows; pass --simulate for test data",
        ),
    })
}

fn build_request(args: &Args) -> Result<SnapshotRequest> {
    let tickers = match (&args.tickers, &args.tickers_file) {
        (Some(list), _) => Ticker::parse_list(list),
        (None, Some(path)) => {
            let file = File::open(normalize_path(path))?;
            Ticker::parse_from_reader(BufReader::new(file))?
        }
        (None, None) => Vec::new(),
    };
    let fields = Field::parse_list(&args.fields);
    let timeout = Duration::try_from_secs_f64(args.timeout).map_err(|e| {
        SnapshotError::InvalidRequest(format!("timeout {}: {}", args.timeout, e))
    })?;
    SnapshotRequest::new(&args.host_app, &args.prog_id, tickers, fields, timeout)
}

fn simulated_connector(args: &Args) -> SimulatedConnector {
    let feed_delay = Duration::from_millis(args.feed_delay_ms.unwrap_or(FEED_DELAY_MS));
    let feed = args.feed_quiet.iter().fold(
        FeedConfig::new(&args.prog_id).publish_after(feed_delay),
        |feed, rule| feed.quiet(rule),
    );
    SimulatedConnector::new(feed).register(&args.host_app)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
///
/// This allows passing Windows paths in quotes without breaking parsing.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["rtd_snapshot"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_normalize_path_strips_quotes() {
        assert_eq!(normalize_path(" \"C:\\data\\t.txt\" "), PathBuf::from("C:\\data\\t.txt"));
        assert_eq!(normalize_path("t.txt"), PathBuf::from("t.txt"));
    }

    #[test]
    fn test_blank_lists_are_rejected() {
        let args = parse(&["--tickers", " , ", "--fields", "Bid"]);
        assert!(matches!(build_request(&args), Err(SnapshotError::InvalidRequest(_))));
    }

    #[test]
    fn test_negative_timeout_is_rejected() {
        let args = parse(&["--tickers", "AAPL", "--fields", "Bid", "--timeout=-1"]);
        assert!(matches!(build_request(&args), Err(SnapshotError::InvalidRequest(_))));
    }

    #[test]
    fn test_missing_tickers_file_is_io_error() {
        let args = parse(&["--tickers-file", "/nonexistent/tickers.txt", "--fields", "Bid"]);
        assert!(matches!(build_request(&args), Err(SnapshotError::Io(_))));
    }

    #[test]
    fn test_run_against_simulated_feed() {
        let args = parse(&[
            "--tickers",
            "AAPL,MSFT",
            "--fields",
            "Bid,Exchange",
            "--timeout",
            "0.5",
            "--simulate",
            "--feed-quiet",
            "MSFT",
            "--poll-interval-ms",
            "20",
            "--feed-delay-ms",
            "10",
        ]);
        let json = run(&args).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["MSFT"]["Bid"].is_null());
        assert!(value["MSFT"]["Exchange"].is_null());
        assert!(value["AAPL"].is_object());
    }

    #[test]
    fn test_custom_host_app_is_activated() {
        let args = parse(&[
            "--host-app",
            "Sheets.Host",
            "--tickers",
            "AAPL",
            "--fields",
            "Bid",
            "--timeout",
            "0.2",
            "--simulate",
            "--feed-quiet",
            "AAPL",
            "--poll-interval-ms",
            "20",
        ]);
        let json = run(&args).unwrap();
        assert_eq!(json, r#"{"AAPL":{"Bid":null}}"#);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_host_is_never_silently_simulated() {
        let args = parse(&["--tickers", "AAPL", "--fields", "Bid", "--timeout", "0.2"]);
        let err = run(&args).unwrap_err();
        assert_eq!(err.kind(), "host_unavailable");
        assert!(err.to_string().contains("--simulate"));
    }
}
