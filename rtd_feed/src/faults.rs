//! Scripted host failures.
//!
//! A `FaultPlan` holds rules keyed by `HostCall`. Each rule lets a number of
//! matching calls through, then fails the next ones: either with the transient
//! busy rejection or with a hard failure.
use rtd_common::error::{E_FAIL, HostCallError};
use rtd_common::host::CallResult;
use strum_macros::Display;

/// Calls of the automation host that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum HostCall {
    /// `set_visible`.
    SetVisible,
    /// `set_alerts_suppressed`.
    SetAlertsSuppressed,
    /// `create_blank_document`.
    CreateDocument,
    /// `first_sheet`.
    FirstSheet,
    /// `cell`.
    Cell,
    /// `set_value`.
    SetValue,
    /// `set_formula`.
    SetFormula,
    /// `get_value`.
    GetValue,
    /// `close_document`.
    CloseDocument,
    /// `quit`.
    Quit,
}

#[derive(Debug, Clone)]
struct FaultRule {
    call: HostCall,
    skip: u32,
    times: u32,
    error: HostCallError,
    seen: u32,
    fired: u32,
}

/// Ordered set of failure rules.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    rules: Vec<FaultRule>,
}

impl FaultPlan {
    /// Plan without any failure.
    pub fn new() -> Self {
        FaultPlan::default()
    }

    /// Rejects `times` calls of `call` as busy after letting `skip` through.
    pub fn reject(self, call: HostCall, skip: u32, times: u32) -> Self {
        self.rule(call, skip, times, HostCallError::rejected())
    }

    /// Fails every call of `call` after letting `skip` through.
    pub fn fail(self, call: HostCall, skip: u32) -> Self {
        let error = HostCallError::failed(call.to_string(), E_FAIL, "scripted host failure");
        self.rule(call, skip, u32::MAX, error)
    }

    /// Adds a rule with an explicit error.
    pub fn rule(mut self, call: HostCall, skip: u32, times: u32, error: HostCallError) -> Self {
        self.rules.push(FaultRule {
            call,
            skip,
            times,
            error,
            seen: 0,
            fired: 0,
        });
        self
    }

    /// Counts a call of `call` and returns the scripted error, if one is due.
    pub fn check(&mut self, call: HostCall) -> CallResult<()> {
        let mut outcome = Ok(());
        for rule in self.rules.iter_mut().filter(|r| r.call == call) {
            rule.seen += 1;
            if outcome.is_ok() && rule.seen > rule.skip && rule.fired < rule.times {
                rule.fired += 1;
                outcome = Err(rule.error.clone());
            }
        }
        outcome
    }
}
