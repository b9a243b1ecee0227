//!
//! Core of the RTD quote snapshot: drives a spreadsheet automation host, injects
//! real-time-data formulas and reads the populated cells back.
//!
//! This crate aggregates:
//! - `error` — `HostCallError` for single host calls and the unified `SnapshotError`.
//! - `result` — handy `Result<T, SnapshotError>` alias.
//! - `request` — tickers, fields, the snapshot request and cell layout.
//! - `value` — raw cell values and the value normalizer.
//! - `host` — the automation host boundary (`HostConnector`, `AutomationHost`).
//! - `retry` — bounded retry policy and the resilient cell accessor.
//! - `session` — host session lifecycle with guaranteed teardown.
//! - `snapshot` — the snapshot protocol and its result.
//! - `defaults` — default identifiers and timings.
#![warn(missing_docs)]
pub mod defaults;
pub mod error;
pub mod host;
pub mod request;
pub mod result;
pub mod retry;
pub mod session;
pub mod snapshot;
pub mod value;

pub use error::{HostCallError, SnapshotError};
pub use request::{CellCoord, Field, SnapshotRequest, Ticker};
pub use result::Result;
pub use snapshot::{Snapshot, SnapshotOptions, SnapshotResult, take_snapshot};
pub use value::{CanonicalValue, RawValue, normalize};
