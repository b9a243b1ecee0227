//! Lifecycle probe for the simulated host.
//!
//! The probe is a shared record of what the connector and host were asked to
//! do. Tests keep a clone of the `Probe` handed to the connector and read it
//! after the host is gone to check that teardown ran, and how many times.
//!
//! The record sits behind a `Mutex`; a poisoned lock is recovered rather than
//! propagated since the counters stay meaningful after a panicking test thread.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rtd_common::host::Activation;
use rtd_common::{CellCoord, RawValue};

/// Counters and flags recorded by the simulator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostProbe {
    /// Calls to `init_threading`.
    pub threading_inits: u32,
    /// Calls to `release_threading`.
    pub threading_releases: u32,
    /// Every activation attempt with its outcome.
    pub activations: Vec<(Activation, bool)>,
    /// Calls to `clear_metadata_cache`.
    pub cache_clears: u32,
    /// Last visibility set on the host.
    pub visible: Option<bool>,
    /// Last alert suppression set on the host.
    pub alerts_suppressed: Option<bool>,
    /// Documents created.
    pub documents_created: u32,
    /// Documents closed.
    pub documents_closed: u32,
    /// Save flag of the last document close.
    pub saved_on_close: Option<bool>,
    /// Calls to `quit`.
    pub quit_calls: u32,
    /// RTD formulas that reached the feed.
    pub subscriptions: u32,
    /// Calls rejected as busy.
    pub rejections: u32,
    /// Message queue pumps.
    pub pumps: u32,
    /// Literal writes in call order.
    pub literals: Vec<(CellCoord, RawValue)>,
    /// Formula writes in call order.
    pub formulas: Vec<(CellCoord, String)>,
}

impl HostProbe {
    /// Teardown steps that ran: document closes plus quits plus threading releases.
    pub fn teardown_calls(&self) -> u32 {
        self.documents_closed + self.quit_calls + self.threading_releases
    }

    /// Last literal written at `coord`, if any.
    pub fn literal_at(&self, coord: CellCoord) -> Option<&RawValue> {
        self.literals
            .iter()
            .rev()
            .find(|(at, _)| *at == coord)
            .map(|(_, value)| value)
    }

    /// Last formula written at `coord`, if any.
    pub fn formula_at(&self, coord: CellCoord) -> Option<&str> {
        self.formulas
            .iter()
            .rev()
            .find(|(at, _)| *at == coord)
            .map(|(_, formula)| formula.as_str())
    }
}

/// Shared handle on a `HostProbe`.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    inner: Arc<Mutex<HostProbe>>,
}

impl Probe {
    /// Fresh probe with zeroed counters.
    pub fn new() -> Self {
        Probe::default()
    }

    /// Applies `update` to the record.
    pub fn record(&self, update: impl FnOnce(&mut HostProbe)) {
        update(&mut self.lock());
    }

    /// Copy of the current record.
    pub fn read(&self) -> HostProbe {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostProbe> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
