//! Tickers, fields and the snapshot request shared between the protocol and the CLI.
//!
//! A request lays its identifiers out on a grid: ticker `i` owns row `i + 2`,
//! field `j` owns column `j + 2`, row 1 carries the field headers and column 1
//! carries the ticker labels.
use std::fmt;
use std::io::BufRead;
use std::time::Duration;

use serde::Serialize;

use crate::error::SnapshotError;
use crate::result::Result;

/// Identifier of a tradable instrument, e.g. `AAPL`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ticker(String);

/// Name of a quote attribute, e.g. `Bid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Field(String);

macro_rules! identifier {
    ($name:ident, $what:literal) => {
        impl $name {
            /// Builds the identifier from `raw`, trimming surrounding whitespace.
            pub fn new(raw: &str) -> Result<Self> {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Err(SnapshotError::InvalidRequest(format!("empty {}", $what)));
                }
                Ok($name(trimmed.to_string()))
            }

            /// Borrowed string form.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ListParser for $name {
            fn parse_list(raw: &str) -> Vec<Self> {
                raw.split(',').filter_map(|item| $name::new(item).ok()).collect()
            }
        }
    };
}

identifier!(Ticker, "ticker");
identifier!(Field, "field");

/// Trait providing list parsing for identifiers.
pub trait ListParser: Sized {
    /// Splits a comma-separated list, dropping blank entries.
    fn parse_list(raw: &str) -> Vec<Self>;

    /// Parses identifiers from a buffered reader.
    ///
    /// Every line may hold several entries separated by commas or whitespace.
    /// Blank lines are skipped.
    fn parse_from_reader<R: BufRead>(reader: R) -> Result<Vec<Self>> {
        let mut items = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let normalized = line.replace(char::is_whitespace, ",");
            items.extend(Self::parse_list(&normalized));
        }
        Ok(items)
    }
}

/// 1-based position of a cell on the scratch sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    /// Row number, starting at 1.
    pub row: u32,
    /// Column number, starting at 1.
    pub col: u32,
}

impl CellCoord {
    /// First data row and column; everything before is a label.
    pub const FIRST_DATA: u32 = 2;

    /// Top-left corner holding the "Ticker" label.
    pub const CORNER: CellCoord = CellCoord { row: 1, col: 1 };

    /// Builds a coordinate from raw row and column numbers.
    pub const fn new(row: u32, col: u32) -> Self {
        CellCoord { row, col }
    }

    /// Header cell naming the field at `field_index`.
    pub fn header(field_index: usize) -> Self {
        CellCoord::new(1, offset(field_index))
    }

    /// Label cell naming the ticker at `ticker_index`.
    pub fn label(ticker_index: usize) -> Self {
        CellCoord::new(offset(ticker_index), 1)
    }

    /// Data cell for the (ticker, field) pair.
    pub fn data(ticker_index: usize, field_index: usize) -> Self {
        CellCoord::new(offset(ticker_index), offset(field_index))
    }

    /// Inverse of [`CellCoord::data`]; `None` for header and label cells.
    pub fn data_index(&self) -> Option<(usize, usize)> {
        if self.row < Self::FIRST_DATA || self.col < Self::FIRST_DATA {
            return None;
        }
        Some((
            (self.row - Self::FIRST_DATA) as usize,
            (self.col - Self::FIRST_DATA) as usize,
        ))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

fn offset(index: usize) -> u32 {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_add(CellCoord::FIRST_DATA))
        .unwrap_or(u32::MAX)
}

/// One snapshot request: which host to drive, what to subscribe and how long to wait.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    /// Activation identifier of the spreadsheet application.
    pub host_app: String,
    /// Program identifier of the RTD provider used in every formula.
    pub prog_id: String,
    /// Tickers in row order.
    pub tickers: Vec<Ticker>,
    /// Fields in column order.
    pub fields: Vec<Field>,
    /// Wall-clock budget for the polling phase.
    pub timeout: Duration,
}

impl SnapshotRequest {
    /// Creates a validated request.
    ///
    /// Both identifier lists must be non-empty and both host identifiers must be
    /// non-blank.
    pub fn new(
        host_app: &str,
        prog_id: &str,
        tickers: Vec<Ticker>,
        fields: Vec<Field>,
        timeout: Duration,
    ) -> Result<Self> {
        let host_app = host_app.trim();
        let prog_id = prog_id.trim();
        if host_app.is_empty() {
            return Err(SnapshotError::InvalidRequest("empty host application id".into()));
        }
        if prog_id.is_empty() {
            return Err(SnapshotError::InvalidRequest("empty RTD program id".into()));
        }
        if tickers.is_empty() {
            return Err(SnapshotError::InvalidRequest("no tickers requested".into()));
        }
        if fields.is_empty() {
            return Err(SnapshotError::InvalidRequest("no fields requested".into()));
        }
        Ok(SnapshotRequest {
            host_app: host_app.to_string(),
            prog_id: prog_id.to_string(),
            tickers,
            fields,
            timeout,
        })
    }

    /// Number of data cells, one per (ticker, field) pair.
    pub fn cell_count(&self) -> usize {
        self.tickers.len() * self.fields.len()
    }

    /// Iterates every data cell in row-major order.
    pub fn data_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.tickers.len())
            .flat_map(move |t| (0..self.fields.len()).map(move |f| CellCoord::data(t, f)))
    }

    /// Real-time-data formula subscribing one cell to (ticker, field).
    pub fn rtd_formula(&self, ticker: &Ticker, field: &Field) -> String {
        format!(
            "=RTD({},\"\",{},{})",
            quoted(&self.prog_id),
            quoted(ticker.as_str()),
            quoted(field.as_str())
        )
    }
}

/// Formula string literal; embedded quotes are doubled.
fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Cursor;

    fn request(tickers: &str, fields: &str) -> SnapshotRequest {
        SnapshotRequest::new(
            "Excel.Application",
            "TradingApp",
            Ticker::parse_list(tickers),
            Field::parse_list(fields),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        let tickers = Ticker::parse_list(" AAPL, ,MSFT,,  ");
        let names: Vec<&str> = tickers.iter().map(Ticker::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_parse_list_keeps_duplicates() {
        assert_eq!(Field::parse_list("Bid,Bid").len(), 2);
    }

    #[test]
    fn test_parse_from_reader_mixed_separators() {
        let input = Cursor::new("AAPL MSFT\n\nNFLX,PLTR\n  QQQ  \n");
        let tickers = Ticker::parse_from_reader(input).unwrap();
        let names: Vec<&str> = tickers.iter().map(Ticker::as_str).collect();
        assert_eq!(names, vec!["AAPL", "MSFT", "NFLX", "PLTR", "QQQ"]);
    }

    #[test]
    fn test_blank_identifier_rejected() {
        assert!(matches!(Ticker::new("   "), Err(SnapshotError::InvalidRequest(_))));
    }

    #[test]
    fn test_request_requires_tickers_and_fields() {
        let empty = SnapshotRequest::new(
            "Excel.Application",
            "TradingApp",
            Ticker::parse_list(" , "),
            Field::parse_list("Bid"),
            Duration::from_secs(1),
        );
        assert!(matches!(empty, Err(SnapshotError::InvalidRequest(_))));

        let no_fields = SnapshotRequest::new(
            "Excel.Application",
            "TradingApp",
            Ticker::parse_list("AAPL"),
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(no_fields, Err(SnapshotError::InvalidRequest(_))));
    }

    #[test]
    fn test_layout_constants() {
        assert_eq!(CellCoord::header(0), CellCoord::new(1, 2));
        assert_eq!(CellCoord::label(0), CellCoord::new(2, 1));
        assert_eq!(CellCoord::data(1, 3), CellCoord::new(3, 5));
        assert_eq!(CellCoord::CORNER.data_index(), None);
        assert_eq!(CellCoord::header(4).data_index(), None);
        assert_eq!(CellCoord::label(4).data_index(), None);
    }

    #[test]
    fn test_data_cells_bijection() {
        let req = request("A,B,C", "X,Y,Z,W");
        let cells: Vec<CellCoord> = req.data_cells().collect();
        assert_eq!(cells.len(), req.cell_count());

        let unique: HashSet<CellCoord> = cells.iter().copied().collect();
        assert_eq!(unique.len(), cells.len());

        for t in 0..req.tickers.len() {
            for f in 0..req.fields.len() {
                assert_eq!(CellCoord::data(t, f).data_index(), Some((t, f)));
            }
        }
    }

    #[test]
    fn test_rtd_formula() {
        let req = request("AAPL", "Bid");
        let formula = req.rtd_formula(&req.tickers[0], &req.fields[0]);
        assert_eq!(formula, r#"=RTD("TradingApp","","AAPL","Bid")"#);
    }

    #[test]
    fn test_rtd_formula_escapes_quotes() {
        let req = request("A\"B", "Bid");
        let formula = req.rtd_formula(&req.tickers[0], &req.fields[0]);
        assert_eq!(formula, r#"=RTD("TradingApp","","A""B","Bid")"#);
    }
}
