//! Bounded retry against the busy-host condition, and the resilient cell accessor.
//!
//! A single-threaded automation host rejects incoming calls while it is busy
//! (e.g. mid-recalculation). It only becomes free again once it gets to run its
//! message loop, so each rejected attempt pumps the caller's message queue once
//! before sleeping. Any other failure is returned immediately.
use std::thread;
use std::time::Duration;

use log::{debug, trace};

use crate::defaults;
use crate::error::SnapshotError;
use crate::host::{AutomationHost, CallResult};
use crate::request::CellCoord;
use crate::result::Result;
use crate::value::RawValue;

/// Attempt budget and pause used while the host keeps rejecting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause after each rejected attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: defaults::RETRY_ATTEMPTS,
            delay: defaults::RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given budget and pause.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
        }
    }

    /// Runs `call` against `host` until it succeeds, fails for good, or the budget runs out.
    ///
    /// `operation` names the call in the resulting `HostFault`.
    pub fn run<H, T, F>(&self, host: &mut H, operation: &str, mut call: F) -> Result<T>
    where
        H: AutomationHost + ?Sized,
        F: FnMut(&mut H) -> CallResult<T>,
    {
        let budget = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match call(host) {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() => {
                    if attempt >= budget {
                        debug!("{} still rejected after {} attempts", operation, attempt);
                        return Err(SnapshotError::exhausted(operation, attempt, e));
                    }
                    trace!("{} rejected (attempt {}/{}), host busy", operation, attempt, budget);
                    host.pump_messages();
                    thread::sleep(self.delay);
                }
                Err(e) => return Err(SnapshotError::fault(operation, e)),
            }
        }
    }
}

/// Addresses a cell, tolerating transient rejection.
pub fn address_cell<H: AutomationHost + ?Sized>(
    host: &mut H,
    sheet: &H::Sheet,
    coord: CellCoord,
    policy: &RetryPolicy,
) -> Result<H::Cell> {
    policy.run(host, &format!("address cell {coord}"), |h| h.cell(sheet, coord))
}

/// Reads a cell's value, tolerating transient rejection.
pub fn read_cell<H: AutomationHost + ?Sized>(
    host: &mut H,
    cell: &H::Cell,
    policy: &RetryPolicy,
) -> Result<RawValue> {
    policy.run(host, "read cell value", |h| h.get_value(cell))
}

/// Addresses then reads the cell at `coord`.
pub fn read_at<H: AutomationHost + ?Sized>(
    host: &mut H,
    sheet: &H::Sheet,
    coord: CellCoord,
    policy: &RetryPolicy,
) -> Result<RawValue> {
    let cell = address_cell(host, sheet, coord, policy)?;
    read_cell(host, &cell, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{E_FAIL, HostCallError};

    /// Host whose reads fail according to a script, then return a fixed number.
    struct ScriptedHost {
        script: Vec<HostCallError>,
        calls: u32,
        pumps: u32,
    }

    impl ScriptedHost {
        fn new(script: Vec<HostCallError>) -> Self {
            ScriptedHost {
                script,
                calls: 0,
                pumps: 0,
            }
        }

        fn rejecting(times: usize) -> Self {
            Self::new(vec![HostCallError::rejected(); times])
        }
    }

    impl AutomationHost for ScriptedHost {
        type Document = ();
        type Sheet = ();
        type Cell = CellCoord;

        fn set_visible(&mut self, _: bool) -> CallResult<()> {
            Ok(())
        }
        fn set_alerts_suppressed(&mut self, _: bool) -> CallResult<()> {
            Ok(())
        }
        fn create_blank_document(&mut self) -> CallResult<()> {
            Ok(())
        }
        fn first_sheet(&mut self, _: &()) -> CallResult<()> {
            Ok(())
        }
        fn cell(&mut self, _: &(), coord: CellCoord) -> CallResult<CellCoord> {
            Ok(coord)
        }
        fn set_value(&mut self, _: &CellCoord, _: &RawValue) -> CallResult<()> {
            Ok(())
        }
        fn set_formula(&mut self, _: &CellCoord, _: &str) -> CallResult<()> {
            Ok(())
        }
        fn get_value(&mut self, _: &CellCoord) -> CallResult<RawValue> {
            let index = self.calls as usize;
            self.calls += 1;
            match self.script.get(index) {
                Some(err) => Err(err.clone()),
                None => Ok(RawValue::Number(7.0)),
            }
        }
        fn close_document(&mut self, _: &(), _: bool) -> CallResult<()> {
            Ok(())
        }
        fn quit(&mut self) -> CallResult<()> {
            Ok(())
        }
        fn pump_messages(&mut self) {
            self.pumps += 1;
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn test_success_after_fewer_rejections_than_budget() {
        let mut host = ScriptedHost::rejecting(5);
        let value = read_cell(&mut host, &CellCoord::new(2, 2), &policy(6)).unwrap();
        assert_eq!(value, RawValue::Number(7.0));
        assert_eq!(host.calls, 6);
        assert_eq!(host.pumps, 5);
    }

    #[test]
    fn test_rejections_equal_to_budget_exhaust() {
        let mut host = ScriptedHost::rejecting(4);
        let err = read_cell(&mut host, &CellCoord::new(2, 2), &policy(4)).unwrap_err();
        assert!(err.is_retry_exhausted());
        assert_eq!(host.calls, 4);
    }

    #[test]
    fn test_rejections_beyond_budget_exhaust() {
        let mut host = ScriptedHost::rejecting(100);
        let err = read_cell(&mut host, &CellCoord::new(2, 2), &policy(3)).unwrap_err();
        match err {
            SnapshotError::HostFault {
                exhausted, source, ..
            } => {
                assert_eq!(exhausted, Some(3));
                assert!(source.is_transient());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(host.calls, 3);
    }

    #[test]
    fn test_non_transient_failure_is_not_retried() {
        let mut host = ScriptedHost::new(vec![HostCallError::failed("Value", E_FAIL, "gone")]);
        let err = read_cell(&mut host, &CellCoord::new(2, 2), &policy(40)).unwrap_err();
        assert!(matches!(err, SnapshotError::HostFault { exhausted: None, .. }));
        assert_eq!(host.calls, 1);
        assert_eq!(host.pumps, 0);
    }

    #[test]
    fn test_zero_budget_still_makes_one_attempt() {
        let mut host = ScriptedHost::rejecting(0);
        assert!(read_cell(&mut host, &CellCoord::new(2, 2), &policy(0)).is_ok());
        assert_eq!(host.calls, 1);
    }

    #[test]
    fn test_read_at_addresses_then_reads() {
        let mut host = ScriptedHost::rejecting(1);
        let value = read_at(&mut host, &(), CellCoord::new(3, 4), &policy(2)).unwrap();
        assert_eq!(value, RawValue::Number(7.0));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 40);
        assert_eq!(policy.delay, Duration::from_millis(50));
    }
}
