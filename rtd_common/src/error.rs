//! Error types shared across the workspace.
//!
//! Two layers are kept apart:
//! - `HostCallError` is what a single automation call reports. Only
//!   `HostCallError::CallRejected` is transient; it is the busy-host signal.
//! - `SnapshotError` is what the snapshot operations return to the caller.
use std::io;

use thiserror::Error;

/// HRESULT reported when the host rejects an incoming call because it is busy.
pub const RPC_E_CALL_REJECTED: i32 = 0x8001_0001_u32 as i32;
/// HRESULT reported when an activation identifier is not registered.
pub const REGDB_E_CLASSNOTREG: i32 = 0x8004_0154_u32 as i32;
/// Generic automation failure code.
pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

/// Failure of a single call across the automation boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostCallError {
    /// The host is busy servicing another call and rejected this one.
    #[error("call rejected by busy host (code {code:#010x})")]
    CallRejected {
        /// Raw error code, normally `RPC_E_CALL_REJECTED`.
        code: i32,
    },

    /// Any other automation failure. Never retried.
    #[error("`{call}` failed (code {code:#010x}): {message}")]
    Failed {
        /// Name of the failed call.
        call: String,
        /// Raw error code.
        code: i32,
        /// Message reported by the host.
        message: String,
    },
}

impl HostCallError {
    /// The busy-host rejection with its standard code.
    pub fn rejected() -> Self {
        HostCallError::CallRejected {
            code: RPC_E_CALL_REJECTED,
        }
    }

    /// A non-transient failure of `call`.
    pub fn failed(call: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        HostCallError::Failed {
            call: call.into(),
            code,
            message: message.into(),
        }
    }

    /// Whether the call may succeed if repeated shortly.
    pub fn is_transient(&self) -> bool {
        matches!(self, HostCallError::CallRejected { .. })
    }

    /// Raw error code carried by the failure.
    pub fn code(&self) -> i32 {
        match self {
            HostCallError::CallRejected { code } | HostCallError::Failed { code, .. } => *code,
        }
    }
}

/// Unified error type returned by the snapshot operations.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Every activation strategy failed; nothing was acquired.
    #[error("host `{host_app}` unavailable after {attempts} activation attempts: {last}")]
    HostUnavailable {
        /// Activation identifier that was requested.
        host_app: String,
        /// Number of strategies tried.
        attempts: usize,
        /// Failure reported by the last strategy.
        last: HostCallError,
    },

    /// A non-transient host failure, or a transient one that outlived the retry budget.
    #[error("host fault during {operation}: {source}{}", exhausted_suffix(.exhausted))]
    HostFault {
        /// Operation that was in progress.
        operation: String,
        /// Failure of the underlying call.
        #[source]
        source: HostCallError,
        /// Set to the attempt count when the retry budget ran out.
        exhausted: Option<u32>,
    },

    /// The request failed validation before any host call was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error, e.g. while reading a ticker file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding the result via serde_json.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exhausted_suffix(exhausted: &Option<u32>) -> String {
    match exhausted {
        Some(attempts) => format!(" (retry budget exhausted after {attempts} attempts)"),
        None => String::new(),
    }
}

impl SnapshotError {
    /// Wraps a non-transient call failure.
    pub fn fault(operation: impl Into<String>, source: HostCallError) -> Self {
        SnapshotError::HostFault {
            operation: operation.into(),
            source,
            exhausted: None,
        }
    }

    /// Wraps the last transient failure once the retry budget is spent.
    pub fn exhausted(operation: impl Into<String>, attempts: u32, source: HostCallError) -> Self {
        SnapshotError::HostFault {
            operation: operation.into(),
            source,
            exhausted: Some(attempts),
        }
    }

    /// Whether this is a host fault caused by running out of retries.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(
            self,
            SnapshotError::HostFault {
                exhausted: Some(_),
                ..
            }
        )
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            SnapshotError::HostUnavailable { .. } => "host_unavailable",
            SnapshotError::HostFault { .. } => "host_fault",
            SnapshotError::InvalidRequest(_) => "invalid_request",
            SnapshotError::Io(_) => "io",
            SnapshotError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rejection_is_transient() {
        assert!(HostCallError::rejected().is_transient());
        assert!(!HostCallError::failed("Cells", E_FAIL, "boom").is_transient());
    }

    #[test]
    fn test_rejection_code_matches_hresult() {
        assert_eq!(HostCallError::rejected().code(), -2147418111);
    }

    #[test]
    fn test_exhausted_fault_display() {
        let err = SnapshotError::exhausted("read cell (2, 2)", 40, HostCallError::rejected());
        assert!(err.is_retry_exhausted());
        assert_eq!(err.kind(), "host_fault");
        let text = err.to_string();
        assert!(text.contains("read cell (2, 2)"));
        assert!(text.contains("exhausted after 40 attempts"));
    }

    #[test]
    fn test_plain_fault_is_not_exhausted() {
        let err = SnapshotError::fault("write header", HostCallError::failed("Value", E_FAIL, "x"));
        assert!(!err.is_retry_exhausted());
        assert!(!err.to_string().contains("exhausted"));
    }
}
