//! Automation host boundary.
//!
//! The protocol never talks to the spreadsheet application directly. It goes
//! through two traits:
//! - `HostConnector` — per-thread automation setup and activation of the
//!   application under one of several `Activation` strategies.
//! - `AutomationHost` — the handful of calls made against a live application.
//!
//! Handles (`Document`, `Sheet`, `Cell`) are opaque associated types; only the
//! host that produced them knows what they point to.
use strum_macros::{Display, EnumIter};

use crate::error::HostCallError;
use crate::request::CellCoord;
use crate::value::RawValue;

/// Result of a single automation call.
pub type CallResult<T> = std::result::Result<T, HostCallError>;

/// Strategy used to activate the automation host, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Activation {
    /// Early-bound activation through cached type-library metadata.
    CachedTypeInfo,
    /// Late-bound activation, independent of any cached metadata.
    LateBound,
    /// Early-bound activation after stale cached metadata was cleared.
    RegeneratedTypeInfo,
}

impl Activation {
    /// Whether the stale metadata cache must be cleared before trying this strategy.
    pub fn clears_cache(&self) -> bool {
        matches!(self, Activation::RegeneratedTypeInfo)
    }
}

/// Entry point to the automation runtime.
pub trait HostConnector {
    /// Live application produced by activation.
    type Host: AutomationHost;

    /// Sets up the calling thread for automation calls.
    fn init_threading(&mut self) -> CallResult<()>;

    /// Activates the application registered as `host_app`.
    fn activate(&mut self, host_app: &str, strategy: Activation) -> CallResult<Self::Host>;

    /// Drops any cached type-library metadata.
    fn clear_metadata_cache(&mut self) -> CallResult<()>;

    /// Releases what `init_threading` set up. Best effort.
    fn release_threading(&mut self);
}

/// Calls available on a live automation host.
pub trait AutomationHost {
    /// Open document (workbook).
    type Document;
    /// Sheet inside a document.
    type Sheet;
    /// Single addressed cell.
    type Cell;

    /// Shows or hides the application window.
    fn set_visible(&mut self, visible: bool) -> CallResult<()>;

    /// Enables or disables interactive alerts and prompts.
    fn set_alerts_suppressed(&mut self, suppressed: bool) -> CallResult<()>;

    /// Creates a new blank document.
    fn create_blank_document(&mut self) -> CallResult<Self::Document>;

    /// First sheet of `document`.
    fn first_sheet(&mut self, document: &Self::Document) -> CallResult<Self::Sheet>;

    /// Addresses one cell of `sheet`.
    fn cell(&mut self, sheet: &Self::Sheet, coord: CellCoord) -> CallResult<Self::Cell>;

    /// Writes a literal value.
    fn set_value(&mut self, cell: &Self::Cell, value: &RawValue) -> CallResult<()>;

    /// Writes a formula.
    fn set_formula(&mut self, cell: &Self::Cell, formula: &str) -> CallResult<()>;

    /// Reads the current value.
    fn get_value(&mut self, cell: &Self::Cell) -> CallResult<RawValue>;

    /// Closes `document`, optionally saving it.
    fn close_document(&mut self, document: &Self::Document, save_changes: bool) -> CallResult<()>;

    /// Terminates the application.
    fn quit(&mut self) -> CallResult<()>;

    /// Processes messages waiting in the calling thread's queue.
    fn pump_messages(&mut self);
}
