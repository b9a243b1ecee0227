//! In-process simulated automation host with a real-time-data feed.
//!
//! This crate stands in for the spreadsheet application and its RTD provider so
//! the snapshot protocol can run without them. It wires together:
//!
//! - `model::feed` — a background feed thread that publishes composite quote
//!   values for every subscribed topic over `crossbeam_channel`.
//! - `host` — `SimulatedHost`, a single-threaded workbook that turns RTD
//!   formulas into feed subscriptions and applies published values whenever it
//!   services a call or pumps its message queue.
//! - `connector` — `SimulatedConnector`, the activation entry point.
//! - `faults` — scripted transient rejections and hard failures per call kind.
//! - `probe` — shared counters recording what the host was asked to do.
#![warn(missing_docs)]
pub mod connector;
pub mod faults;
pub mod host;
pub mod model;
pub mod probe;

pub use connector::SimulatedConnector;
pub use faults::{FaultPlan, HostCall};
pub use host::SimulatedHost;
pub use model::feed::FeedConfig;
pub use probe::{HostProbe, Probe};
