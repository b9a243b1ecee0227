//! The spreadsheet application driven through COM automation.
use log::debug;
use rtd_common::host::{AutomationHost, CallResult};
use rtd_common::{CellCoord, RawValue};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, MSG, PM_REMOVE, PeekMessageW, TranslateMessage,
};
use windows::core::{BSTR, VARIANT};

use crate::codes::call_error;
use crate::dispatch::{Dispatch, raw_value, variant_of};

/// `E_INVALIDARG`.
const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;

/// Running spreadsheet application.
pub struct ComHost {
    app: Dispatch,
}

/// Open workbook.
pub struct ComDocument(Dispatch);

/// Worksheet of an open workbook.
pub struct ComSheet(Dispatch);

/// Single-cell range.
pub struct ComCell(Dispatch);

impl ComHost {
    pub(crate) fn new(app: Dispatch) -> Self {
        ComHost { app }
    }
}

impl AutomationHost for ComHost {
    type Document = ComDocument;
    type Sheet = ComSheet;
    type Cell = ComCell;

    fn set_visible(&mut self, visible: bool) -> CallResult<()> {
        self.app.put("Visible", VARIANT::from(visible))
    }

    fn set_alerts_suppressed(&mut self, suppressed: bool) -> CallResult<()> {
        self.app.put("DisplayAlerts", VARIANT::from(!suppressed))
    }

    fn create_blank_document(&mut self) -> CallResult<ComDocument> {
        let workbooks = self.app.child("Workbooks", &[], "Workbooks")?;
        let workbook = workbooks.child("Add", &[], "Workbook")?;
        debug!("Scratch workbook created");
        Ok(ComDocument(workbook))
    }

    fn first_sheet(&mut self, document: &ComDocument) -> CallResult<ComSheet> {
        let sheet = document
            .0
            .child("Worksheets", &[VARIANT::from(1i32)], "Worksheet")?;
        Ok(ComSheet(sheet))
    }

    fn cell(&mut self, sheet: &ComSheet, coord: CellCoord) -> CallResult<ComCell> {
        let index = |n: u32| {
            i32::try_from(n)
                .map(VARIANT::from)
                .map_err(|_| call_error("Cells", E_INVALIDARG, &format!("cell {coord} out of range")))
        };
        let args = [index(coord.row)?, index(coord.col)?];
        Ok(ComCell(sheet.0.child("Cells", &args, "Range")?))
    }

    fn set_value(&mut self, cell: &ComCell, value: &RawValue) -> CallResult<()> {
        cell.0.put("Value", variant_of(value))
    }

    fn set_formula(&mut self, cell: &ComCell, formula: &str) -> CallResult<()> {
        cell.0.put("Formula", VARIANT::from(BSTR::from(formula)))
    }

    fn get_value(&mut self, cell: &ComCell) -> CallResult<RawValue> {
        let value = cell.0.get("Value", &[])?;
        raw_value(&value)
    }

    fn close_document(&mut self, document: &ComDocument, save_changes: bool) -> CallResult<()> {
        document
            .0
            .call("Close", &[VARIANT::from(save_changes)])
            .map(|_| ())
    }

    fn quit(&mut self) -> CallResult<()> {
        self.app.call("Quit", &[]).map(|_| ())
    }

    fn pump_messages(&mut self) {
        let mut msg = MSG::default();
        unsafe {
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}
