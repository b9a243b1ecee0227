//! COM automation connector for the spreadsheet application.
//!
//! On Windows `ComConnector` activates the application registered under the
//! host identifier (`Excel.Application` by default) as a local server and
//! drives it through late-bound `IDispatch` calls: `Visible`, `DisplayAlerts`,
//! `Workbooks.Add`, `Worksheets`, `Cells`, `Value`, `Formula`, `Close` and
//! `Quit`. A busy application answers `RPC_E_CALL_REJECTED`, which surfaces as
//! the transient `HostCallError::CallRejected`; the message pump drains the
//! thread's queue between retries.
//!
//! `codes` holds the status code mapping and builds on every platform.
#![warn(missing_docs)]
pub mod codes;
#[cfg(windows)]
mod connector;
#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod host;

#[cfg(windows)]
pub use connector::ComConnector;
#[cfg(windows)]
pub use host::{ComCell, ComDocument, ComHost, ComSheet};
