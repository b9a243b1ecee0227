//! Snapshot protocol.
//!
//! One call to [`take_snapshot`] walks the states
//! `Init → Opened → HeadersWritten → FormulasInjected → Polling → Reading → Done`,
//! falling into `Failed` on the first error. The host session is closed exactly
//! once on the way into either terminal state.
//!
//! Polling stops as soon as the configured share of data cells holds a value, or
//! when the request timeout elapses. Either way a final pass reads and normalizes
//! every data cell; cells the feed never populated come back as absent values.
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use strum_macros::Display;

use crate::defaults;
use crate::error::SnapshotError;
use crate::host::{AutomationHost, HostConnector};
use crate::request::{CellCoord, Field, SnapshotRequest, Ticker};
use crate::result::Result;
use crate::retry::{RetryPolicy, address_cell, read_at};
use crate::session::{HostSession, Workspace};
use crate::value::{CanonicalValue, RawValue, normalize};

/// Tunables of the protocol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotOptions {
    /// Share of data cells, in `[0, 1]`, that ends polling early once filled.
    pub fill_threshold: f64,
    /// Pause between two polling scans.
    pub poll_interval: Duration,
    /// Retry policy for every cell address and read.
    pub retry: RetryPolicy,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        SnapshotOptions {
            fill_threshold: defaults::FILL_THRESHOLD,
            poll_interval: defaults::POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }
}

impl SnapshotOptions {
    /// Number of filled cells out of `total` that satisfies the threshold.
    pub fn required_cells(&self, total: usize) -> usize {
        let share = if self.fill_threshold.is_nan() {
            defaults::FILL_THRESHOLD
        } else {
            self.fill_threshold.clamp(0.0, 1.0)
        };
        (total as f64 * share).ceil() as usize
    }
}

/// Protocol states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SnapshotState {
    /// Nothing acquired yet.
    Init,
    /// Host session acquired.
    Opened,
    /// Label and field headers written.
    HeadersWritten,
    /// Ticker labels and RTD formulas written.
    FormulasInjected,
    /// Waiting for the feed to populate cells.
    Polling,
    /// Final read of every data cell.
    Reading,
    /// Result assembled and session closed.
    Done,
    /// An error occurred and the session was closed.
    Failed,
}

/// Values of one ticker, keyed by field in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteRow {
    values: Vec<(Field, CanonicalValue)>,
}

impl QuoteRow {
    /// Sets `field`, replacing an earlier value of the same field in place.
    pub fn insert(&mut self, field: Field, value: CanonicalValue) {
        match self.values.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.values.push((field, value)),
        }
    }

    /// Value of the field named `field`.
    pub fn get(&self, field: &str) -> Option<&CanonicalValue> {
        self.values
            .iter()
            .find(|(f, _)| f.as_str() == field)
            .map(|(_, v)| v)
    }

    /// Fields and values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &CanonicalValue)> {
        self.values.iter().map(|(f, v)| (f, v))
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no field was recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for QuoteRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (field, value) in &self.values {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

/// Ticker → field → value, in request order.
///
/// A ticker listed twice keeps its first position and its last row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotResult {
    rows: Vec<(Ticker, QuoteRow)>,
}

impl SnapshotResult {
    /// Sets the row of `ticker`, replacing an earlier row in place.
    pub fn insert(&mut self, ticker: Ticker, row: QuoteRow) {
        match self.rows.iter_mut().find(|(t, _)| *t == ticker) {
            Some(slot) => slot.1 = row,
            None => self.rows.push((ticker, row)),
        }
    }

    /// Row of the ticker named `ticker`.
    pub fn get(&self, ticker: &str) -> Option<&QuoteRow> {
        self.rows
            .iter()
            .find(|(t, _)| t.as_str() == ticker)
            .map(|(_, r)| r)
    }

    /// Shortcut for a single value.
    pub fn value(&self, ticker: &str, field: &str) -> Option<&CanonicalValue> {
        self.get(ticker).and_then(|row| row.get(field))
    }

    /// Tickers and rows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Ticker, &QuoteRow)> {
        self.rows.iter().map(|(t, r)| (t, r))
    }

    /// Number of distinct tickers.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result holds no ticker.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Encodes the result as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encodes the result as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for SnapshotResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (ticker, row) in &self.rows {
            map.serialize_entry(ticker, row)?;
        }
        map.end()
    }
}

/// How polling went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    /// Completed scans of the data cells.
    pub scans: u32,
    /// Filled cells seen on the last scan.
    pub filled: usize,
    /// Total data cells.
    pub total: usize,
    /// Whether polling ended on the fill threshold rather than the deadline.
    pub threshold_met: bool,
    /// Time spent polling.
    pub elapsed: Duration,
}

/// Outcome of a successful snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Normalized values.
    pub values: SnapshotResult,
    /// Polling statistics.
    pub stats: PollStats,
}

/// Runs one snapshot for `request` against the host reached through `connector`.
pub fn take_snapshot<C: HostConnector>(
    connector: C,
    request: &SnapshotRequest,
    options: &SnapshotOptions,
) -> Result<Snapshot> {
    SnapshotProtocol::new(request, options).run(connector)
}

/// State machine driving one snapshot.
pub struct SnapshotProtocol<'r> {
    request: &'r SnapshotRequest,
    options: &'r SnapshotOptions,
    state: SnapshotState,
}

impl<'r> SnapshotProtocol<'r> {
    /// Prepares a protocol run in the `Init` state.
    pub fn new(request: &'r SnapshotRequest, options: &'r SnapshotOptions) -> Self {
        SnapshotProtocol {
            request,
            options,
            state: SnapshotState::Init,
        }
    }

    /// Current state.
    pub fn state(&self) -> SnapshotState {
        self.state
    }

    /// Runs the protocol to a terminal state.
    pub fn run<C: HostConnector>(&mut self, connector: C) -> Result<Snapshot> {
        let mut session = match HostSession::open(connector, &self.request.host_app) {
            Ok(session) => session,
            Err(e) => {
                self.advance(SnapshotState::Failed);
                return Err(e);
            }
        };
        self.advance(SnapshotState::Opened);

        let outcome = session.workspace().and_then(|mut ws| self.acquire(&mut ws));
        session.close();

        match outcome {
            Ok(snapshot) => {
                self.advance(SnapshotState::Done);
                info!(
                    "Snapshot of {} cells done: {} filled after {} scans in {:?}",
                    snapshot.stats.total,
                    snapshot.stats.filled,
                    snapshot.stats.scans,
                    snapshot.stats.elapsed
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.advance(SnapshotState::Failed);
                Err(e)
            }
        }
    }

    fn advance(&mut self, next: SnapshotState) {
        debug!("Snapshot state {} -> {}", self.state, next);
        self.state = next;
    }

    fn acquire<H: AutomationHost>(&mut self, ws: &mut Workspace<'_, H>) -> Result<Snapshot> {
        self.write_headers(ws)?;
        self.advance(SnapshotState::HeadersWritten);

        self.inject_formulas(ws)?;
        self.advance(SnapshotState::FormulasInjected);

        self.advance(SnapshotState::Polling);
        let stats = self.poll(ws)?;

        self.advance(SnapshotState::Reading);
        let values = self.read_all(ws)?;
        Ok(Snapshot { values, stats })
    }

    fn write_headers<H: AutomationHost>(&self, ws: &mut Workspace<'_, H>) -> Result<()> {
        self.write_text(ws, CellCoord::CORNER, defaults::TICKER_LABEL)?;
        for (j, field) in self.request.fields.iter().enumerate() {
            self.write_text(ws, CellCoord::header(j), field.as_str())?;
        }
        Ok(())
    }

    fn inject_formulas<H: AutomationHost>(&self, ws: &mut Workspace<'_, H>) -> Result<()> {
        for (i, ticker) in self.request.tickers.iter().enumerate() {
            self.write_text(ws, CellCoord::label(i), ticker.as_str())?;
            for (j, field) in self.request.fields.iter().enumerate() {
                let coord = CellCoord::data(i, j);
                let formula = self.request.rtd_formula(ticker, field);
                let cell = self.address(ws, coord)?;
                ws.host
                    .set_formula(&cell, &formula)
                    .map_err(|e| SnapshotError::fault(format!("write formula at {coord}"), e))?;
            }
        }
        debug!("Injected {} RTD formulas", self.request.cell_count());
        Ok(())
    }

    fn poll<H: AutomationHost>(&self, ws: &mut Workspace<'_, H>) -> Result<PollStats> {
        let started = Instant::now();
        // A timeout too large for the clock polls until the threshold is met.
        let deadline = started.checked_add(self.request.timeout);
        if deadline.is_none() {
            warn!(
                "Timeout {:?} is past the end of the clock, polling without a deadline",
                self.request.timeout
            );
        }
        let total = self.request.cell_count();
        let required = self.options.required_cells(total);
        let mut stats = PollStats {
            scans: 0,
            filled: 0,
            total,
            threshold_met: false,
            elapsed: Duration::ZERO,
        };

        while deadline.is_none_or(|deadline| Instant::now() < deadline) {
            let mut filled = 0;
            for coord in self.request.data_cells() {
                if self.read(ws, coord)?.is_present() {
                    filled += 1;
                }
            }
            stats.scans += 1;
            stats.filled = filled;
            debug!("Scan {}: {}/{} cells filled", stats.scans, filled, total);
            if filled >= required {
                stats.threshold_met = true;
                break;
            }
            let pause = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    self.options.poll_interval.min(remaining)
                }
                None => self.options.poll_interval,
            };
            thread::sleep(pause);
        }

        stats.elapsed = started.elapsed();
        if !stats.threshold_met {
            info!(
                "Deadline reached with {}/{} cells filled, reading what is there",
                stats.filled, total
            );
        }
        Ok(stats)
    }

    fn read_all<H: AutomationHost>(&self, ws: &mut Workspace<'_, H>) -> Result<SnapshotResult> {
        let mut result = SnapshotResult::default();
        for (i, ticker) in self.request.tickers.iter().enumerate() {
            let mut row = QuoteRow::default();
            for (j, field) in self.request.fields.iter().enumerate() {
                let raw = self.read(ws, CellCoord::data(i, j))?;
                row.insert(field.clone(), normalize(&raw));
            }
            result.insert(ticker.clone(), row);
        }
        Ok(result)
    }

    fn write_text<H: AutomationHost>(
        &self,
        ws: &mut Workspace<'_, H>,
        coord: CellCoord,
        text: &str,
    ) -> Result<()> {
        let cell = self.address(ws, coord)?;
        ws.host
            .set_value(&cell, &RawValue::from(text))
            .map_err(|e| SnapshotError::fault(format!("write label at {coord}"), e))
    }

    fn address<H: AutomationHost>(
        &self,
        ws: &mut Workspace<'_, H>,
        coord: CellCoord,
    ) -> Result<H::Cell> {
        address_cell(&mut *ws.host, ws.sheet, coord, &self.options.retry)
    }

    fn read<H: AutomationHost>(
        &self,
        ws: &mut Workspace<'_, H>,
        coord: CellCoord,
    ) -> Result<RawValue> {
        read_at(&mut *ws.host, ws.sheet, coord, &self.options.retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ListParser;

    #[test]
    fn test_required_cells_rounds_up() {
        let options = SnapshotOptions::default();
        assert_eq!(options.required_cells(4), 2);
        assert_eq!(options.required_cells(3), 2);
        assert_eq!(options.required_cells(1), 1);
    }

    #[test]
    fn test_required_cells_clamps_threshold() {
        let mut options = SnapshotOptions::default();
        options.fill_threshold = 1.7;
        assert_eq!(options.required_cells(4), 4);
        options.fill_threshold = -1.0;
        assert_eq!(options.required_cells(4), 0);
        options.fill_threshold = f64::NAN;
        assert_eq!(options.required_cells(4), 2);
    }

    #[test]
    fn test_result_keeps_order_and_overwrites_duplicates() {
        let mut result = SnapshotResult::default();
        let tickers = Ticker::parse_list("MSFT,AAPL,MSFT");
        for (n, ticker) in tickers.into_iter().enumerate() {
            let mut row = QuoteRow::default();
            row.insert(Field::new("Bid").unwrap(), CanonicalValue::Number(n as f64));
            result.insert(ticker, row);
        }
        assert_eq!(result.len(), 2);
        assert_eq!(result.to_json().unwrap(), r#"{"MSFT":{"Bid":2.0},"AAPL":{"Bid":1.0}}"#);
    }

    #[test]
    fn test_row_serializes_absence_as_null() {
        let mut row = QuoteRow::default();
        row.insert(Field::new("Ask").unwrap(), CanonicalValue::Absent);
        row.insert(Field::new("Exchange").unwrap(), CanonicalValue::Text("NSDQ".into()));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"Ask":null,"Exchange":"NSDQ"}"#);
    }
}
