//! Output documents written by the tool.
//!
//! A successful run prints the snapshot result as JSON on stdout. A failed run
//! prints a `Diagnostic` on stderr instead, so a caller parsing stdout never
//! mistakes an error for data.
use chrono::{SecondsFormat, Utc};
use rtd_common::{SnapshotError, SnapshotResult};
use serde::Serialize;

/// Renders the result, compact unless `pretty` is set.
pub fn render_result(result: &SnapshotResult, pretty: bool) -> Result<String, SnapshotError> {
    if pretty {
        result.to_json_pretty()
    } else {
        result.to_json()
    }
}

/// Failure report of one run.
#[derive(Debug, Serialize)]
pub struct Diagnostic {
    /// Human-readable error.
    pub error: String,
    /// Error class, e.g. `host_fault`.
    pub kind: &'static str,
    /// Whether the retry budget ran out.
    pub retry_exhausted: bool,
    /// UTC time of the failure, RFC 3339.
    pub when: String,
    /// Arguments of the run.
    pub args: DiagnosticArgs,
}

/// Request parameters echoed in a `Diagnostic`.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticArgs {
    /// Activation identifier of the application.
    pub host_app: String,
    /// RTD provider identifier.
    pub prog_id: String,
    /// Requested tickers as given.
    pub tickers: String,
    /// Requested fields as given.
    pub fields: String,
    /// Polling budget in seconds.
    pub timeout: f64,
}

impl Diagnostic {
    /// Builds the report of `error`, stamped with the current time.
    pub fn new(error: &SnapshotError, args: DiagnosticArgs) -> Self {
        Diagnostic {
            error: error.to_string(),
            kind: error.kind(),
            retry_exhausted: error.is_retry_exhausted(),
            when: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            args,
        }
    }

    /// Compact JSON form; falls back to the bare message if encoding fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.error.clone())
    }
}
