//! Simulated spreadsheet host.
//!
//! `SimulatedHost` keeps one grid per open document. Writing an RTD formula
//! that names the configured provider subscribes the cell to the feed; the
//! cell stays empty until the feed publishes and the host gets to apply the
//! update. Updates are applied at the start of every serviced call and on
//! every message pump, mirroring a host that refreshes RTD cells from its own
//! message loop. A formula naming another provider evaluates to `#N/A`.
use std::collections::HashMap;

use log::{debug, warn};
use rtd_common::error::{E_FAIL, HostCallError};
use rtd_common::host::{AutomationHost, CallResult};
use rtd_common::request::CellCoord;
use rtd_common::value::RawValue;

use crate::faults::{FaultPlan, HostCall};
use crate::model::feed::{FeedConfig, FeedHandle, RtdFeed};
use crate::model::topic::{Topic, parse_rtd};
use crate::probe::Probe;

/// HRESULT returned once the host process has gone away.
pub const RPC_E_DISCONNECTED: i32 = 0x8001_0108_u32 as i32;

/// Value shown by a formula the host cannot evaluate.
pub const NOT_AVAILABLE: &str = "#N/A";

/// Open document handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u32);

/// Sheet handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetRef {
    document: DocumentId,
}

/// Cell handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    document: DocumentId,
    coord: CellCoord,
}

#[derive(Debug, Clone)]
struct Slot {
    value: RawValue,
    formula: Option<String>,
}

#[derive(Debug, Default)]
struct Grid {
    cells: HashMap<CellCoord, Slot>,
}

/// Single-threaded workbook host backed by an `RtdFeed`.
pub struct SimulatedHost {
    feed_config: FeedConfig,
    feed: Option<FeedHandle>,
    faults: FaultPlan,
    probe: Probe,
    documents: HashMap<DocumentId, Grid>,
    next_document: u32,
    subscribers: HashMap<Topic, Vec<CellRef>>,
    running: bool,
}

impl SimulatedHost {
    /// Host serving `feed_config`, failing as `faults` dictates and recording into `probe`.
    pub fn new(feed_config: FeedConfig, faults: FaultPlan, probe: Probe) -> Self {
        SimulatedHost {
            feed_config,
            feed: None,
            faults,
            probe,
            documents: HashMap::new(),
            next_document: 1,
            subscribers: HashMap::new(),
            running: true,
        }
    }

    /// Formula stored at `cell`, if any.
    pub fn formula(&self, cell: &CellRef) -> Option<&str> {
        self.documents
            .get(&cell.document)?
            .cells
            .get(&cell.coord)?
            .formula
            .as_deref()
    }

    /// Common preamble of every call: liveness, pending updates, scripted faults.
    fn service(&mut self, call: HostCall) -> CallResult<()> {
        if !self.running {
            return Err(HostCallError::failed(
                call.to_string(),
                RPC_E_DISCONNECTED,
                "host has quit",
            ));
        }
        self.apply_updates();
        let outcome = self.faults.check(call);
        if let Err(e) = &outcome {
            if e.is_transient() {
                self.probe.record(|p| p.rejections += 1);
            }
        }
        outcome
    }

    fn apply_updates(&mut self) {
        let Some(feed) = self.feed.as_ref() else {
            return;
        };
        for tick in feed.drain() {
            let Some(cells) = self.subscribers.get(&tick.topic) else {
                continue;
            };
            for cell in cells {
                if let Some(grid) = self.documents.get_mut(&cell.document) {
                    let slot = grid.cells.entry(cell.coord).or_insert_with(empty_slot);
                    slot.value = RawValue::Text(tick.raw.clone());
                }
            }
        }
    }

    fn grid(&mut self, document: DocumentId, call: HostCall) -> CallResult<&mut Grid> {
        self.documents.get_mut(&document).ok_or_else(|| {
            HostCallError::failed(call.to_string(), E_FAIL, "document is not open")
        })
    }

    fn subscribe(&mut self, cell: CellRef, topic: Topic) {
        let feed = self
            .feed
            .get_or_insert_with(|| RtdFeed::start(self.feed_config.clone()));
        feed.subscribe(topic.clone());
        self.subscribers.entry(topic).or_default().push(cell);
        self.probe.record(|p| p.subscriptions += 1);
    }

    fn unsubscribe_document(&mut self, document: DocumentId) {
        for cells in self.subscribers.values_mut() {
            cells.retain(|c| c.document != document);
        }
        self.subscribers.retain(|_, cells| !cells.is_empty());
    }
}

fn empty_slot() -> Slot {
    Slot {
        value: RawValue::Empty,
        formula: None,
    }
}

impl AutomationHost for SimulatedHost {
    type Document = DocumentId;
    type Sheet = SheetRef;
    type Cell = CellRef;

    fn set_visible(&mut self, visible: bool) -> CallResult<()> {
        self.service(HostCall::SetVisible)?;
        self.probe.record(|p| p.visible = Some(visible));
        Ok(())
    }

    fn set_alerts_suppressed(&mut self, suppressed: bool) -> CallResult<()> {
        self.service(HostCall::SetAlertsSuppressed)?;
        self.probe.record(|p| p.alerts_suppressed = Some(suppressed));
        Ok(())
    }

    fn create_blank_document(&mut self) -> CallResult<DocumentId> {
        self.service(HostCall::CreateDocument)?;
        let id = DocumentId(self.next_document);
        self.next_document += 1;
        self.documents.insert(id, Grid::default());
        self.probe.record(|p| p.documents_created += 1);
        Ok(id)
    }

    fn first_sheet(&mut self, document: &DocumentId) -> CallResult<SheetRef> {
        self.service(HostCall::FirstSheet)?;
        self.grid(*document, HostCall::FirstSheet)?;
        Ok(SheetRef {
            document: *document,
        })
    }

    fn cell(&mut self, sheet: &SheetRef, coord: CellCoord) -> CallResult<CellRef> {
        self.service(HostCall::Cell)?;
        if coord.row == 0 || coord.col == 0 {
            return Err(HostCallError::failed("Cell", E_FAIL, format!("invalid cell {coord}")));
        }
        self.grid(sheet.document, HostCall::Cell)?;
        Ok(CellRef {
            document: sheet.document,
            coord,
        })
    }

    fn set_value(&mut self, cell: &CellRef, value: &RawValue) -> CallResult<()> {
        self.service(HostCall::SetValue)?;
        let grid = self.grid(cell.document, HostCall::SetValue)?;
        let coord = cell.coord;
        grid.cells.insert(
            cell.coord,
            Slot {
                value: value.clone(),
                formula: None,
            },
        );
        let value = value.clone();
        self.probe.record(|p| p.literals.push((coord, value)));
        Ok(())
    }

    fn set_formula(&mut self, cell: &CellRef, formula: &str) -> CallResult<()> {
        self.service(HostCall::SetFormula)?;
        let provider = self.feed_config.provider_id.clone();
        let grid = self.grid(cell.document, HostCall::SetFormula)?;
        let rtd = parse_rtd(formula);
        let value = match &rtd {
            Some(call) if !call.prog_id.eq_ignore_ascii_case(&provider) => {
                debug!("Unknown RTD provider `{}` at {}", call.prog_id, cell.coord);
                RawValue::from(NOT_AVAILABLE)
            }
            _ => RawValue::Empty,
        };
        grid.cells.insert(
            cell.coord,
            Slot {
                value,
                formula: Some(formula.to_string()),
            },
        );
        let coord = cell.coord;
        self.probe
            .record(|p| p.formulas.push((coord, formula.to_string())));
        if let Some(call) = rtd.filter(|c| c.prog_id.eq_ignore_ascii_case(&provider)) {
            self.subscribe(*cell, call.topic);
        }
        Ok(())
    }

    fn get_value(&mut self, cell: &CellRef) -> CallResult<RawValue> {
        self.service(HostCall::GetValue)?;
        let grid = self.grid(cell.document, HostCall::GetValue)?;
        Ok(grid
            .cells
            .get(&cell.coord)
            .map(|slot| slot.value.clone())
            .unwrap_or(RawValue::Empty))
    }

    fn close_document(&mut self, document: &DocumentId, save_changes: bool) -> CallResult<()> {
        self.service(HostCall::CloseDocument)?;
        if self.documents.remove(document).is_none() {
            return Err(HostCallError::failed("CloseDocument", E_FAIL, "document is not open"));
        }
        self.unsubscribe_document(*document);
        self.probe.record(|p| {
            p.documents_closed += 1;
            p.saved_on_close = Some(save_changes);
        });
        Ok(())
    }

    fn quit(&mut self) -> CallResult<()> {
        self.probe.record(|p| p.quit_calls += 1);
        self.service(HostCall::Quit)?;
        if !self.documents.is_empty() {
            warn!("Host quitting with {} open documents", self.documents.len());
        }
        self.running = false;
        self.documents.clear();
        self.subscribers.clear();
        if let Some(mut feed) = self.feed.take() {
            feed.shutdown();
        }
        Ok(())
    }

    fn pump_messages(&mut self) {
        self.probe.record(|p| p.pumps += 1);
        self.apply_updates();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn host(config: FeedConfig) -> (SimulatedHost, SheetRef) {
        let mut host = SimulatedHost::new(config, FaultPlan::new(), Probe::new());
        let document = host.create_blank_document().unwrap();
        let sheet = host.first_sheet(&document).unwrap();
        (host, sheet)
    }

    #[test]
    fn test_literal_values_round_trip_through_cells() {
        let (mut host, sheet) = host(FeedConfig::default());
        let cell = host.cell(&sheet, CellCoord::new(1, 1)).unwrap();
        host.set_value(&cell, &RawValue::from("Ticker")).unwrap();
        assert_eq!(host.get_value(&cell).unwrap(), RawValue::from("Ticker"));

        let untouched = host.cell(&sheet, CellCoord::new(9, 9)).unwrap();
        assert_eq!(host.get_value(&untouched).unwrap(), RawValue::Empty);
    }

    #[test]
    fn test_rtd_formula_fills_cell_once_feed_publishes() {
        let config = FeedConfig::default().publish_after(Duration::from_millis(150));
        let (mut host, sheet) = host(config);
        let cell = host.cell(&sheet, CellCoord::new(2, 2)).unwrap();
        host.set_formula(&cell, r#"=RTD("TradingApp","","AAPL","Bid")"#).unwrap();
        assert_eq!(host.get_value(&cell).unwrap(), RawValue::Empty);
        assert_eq!(host.formula(&cell), Some(r#"=RTD("TradingApp","","AAPL","Bid")"#));

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut value = RawValue::Empty;
        while Instant::now() < deadline && !value.is_present() {
            thread::sleep(Duration::from_millis(10));
            host.pump_messages();
            value = host.get_value(&cell).unwrap();
        }
        match value {
            RawValue::Text(text) => assert!(text.starts_with("OK;")),
            other => panic!("unexpected value: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_provider_is_not_available() {
        let (mut host, sheet) = host(FeedConfig::default());
        let cell = host.cell(&sheet, CellCoord::new(2, 2)).unwrap();
        host.set_formula(&cell, r#"=RTD("Other","","AAPL","Bid")"#).unwrap();
        assert_eq!(host.get_value(&cell).unwrap(), RawValue::from(NOT_AVAILABLE));
    }

    #[test]
    fn test_calls_after_quit_fail() {
        let (mut host, sheet) = host(FeedConfig::default());
        host.quit().unwrap();
        let err = host.cell(&sheet, CellCoord::new(1, 1)).unwrap_err();
        assert_eq!(err.code(), RPC_E_DISCONNECTED);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_zero_coordinate_rejected() {
        let (mut host, sheet) = host(FeedConfig::default());
        assert!(host.cell(&sheet, CellCoord::new(0, 1)).is_err());
    }
}
