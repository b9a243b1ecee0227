//! Automation status codes and the cell error values the spreadsheet returns.
//!
//! Nothing here touches COM, so the mapping is shared by every platform and
//! tested everywhere.
use rtd_common::HostCallError;
use rtd_common::RawValue;
use rtd_common::error::RPC_E_CALL_REJECTED;

/// Facility prefix of the cell error codes, e.g. `0x800A07FA` for `#N/A`.
const CELL_ERROR_BASE: u32 = 0x800A_0000;

/// Cell error numbers with their display text.
const CELL_ERRORS: [(u32, &str); 7] = [
    (2000, "#NULL!"),
    (2007, "#DIV/0!"),
    (2015, "#VALUE!"),
    (2023, "#REF!"),
    (2029, "#NAME?"),
    (2036, "#NUM!"),
    (2042, "#N/A"),
];

/// Maps a failed automation call onto the host error taxonomy.
///
/// Only `RPC_E_CALL_REJECTED` is transient; every other code is a hard failure
/// that carries the host's message.
pub fn call_error(call: &str, code: i32, message: &str) -> HostCallError {
    if code == RPC_E_CALL_REJECTED {
        HostCallError::CallRejected { code }
    } else {
        HostCallError::failed(call, code, message.trim())
    }
}

/// Display text of a cell error status, e.g. `#N/A`.
///
/// Accepts either the full status code or the bare error number.
pub fn cell_error_text(scode: i32) -> Option<&'static str> {
    let scode = scode as u32;
    let number = if scode & 0xFFFF_0000 == CELL_ERROR_BASE {
        scode & 0xFFFF
    } else {
        scode
    };
    CELL_ERRORS
        .iter()
        .find(|(n, _)| *n == number)
        .map(|(_, text)| *text)
}

/// Raw value reported for a cell holding an error status.
pub fn cell_error_value(scode: i32) -> RawValue {
    match cell_error_text(scode) {
        Some(text) => RawValue::from(text),
        None => RawValue::Text(format!("#ERR{:#010x}", scode as u32)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtd_common::error::E_FAIL;

    #[test]
    fn test_only_call_rejected_is_transient() {
        let rejected = call_error("Value", RPC_E_CALL_REJECTED, "");
        assert!(rejected.is_transient());
        assert_eq!(rejected.code(), RPC_E_CALL_REJECTED);

        let failed = call_error("Value", E_FAIL, " Unspecified error\r\n");
        assert!(!failed.is_transient());
        assert_eq!(
            failed,
            HostCallError::failed("Value", E_FAIL, "Unspecified error")
        );
    }

    #[test]
    fn test_cell_errors_by_full_code_and_number() {
        assert_eq!(cell_error_text(0x800A_07FA_u32 as i32), Some("#N/A"));
        assert_eq!(cell_error_text(2007), Some("#DIV/0!"));
        assert_eq!(cell_error_text(0x800A_0001_u32 as i32), None);
    }

    #[test]
    fn test_unknown_cell_error_keeps_its_code() {
        assert_eq!(cell_error_value(2042), RawValue::from("#N/A"));
        assert_eq!(
            cell_error_value(0x800A_0001_u32 as i32),
            RawValue::from("#ERR0x800a0001")
        );
    }
}
