//! Activation entry point of the simulator.
//!
//! `SimulatedConnector` plays the automation runtime: it knows which
//! application identifiers are registered, can be told that some activation
//! strategies fail, and hands out `SimulatedHost`s wired to the configured feed.
use std::collections::HashSet;

use log::debug;
use rtd_common::defaults;
use rtd_common::error::{E_FAIL, HostCallError, REGDB_E_CLASSNOTREG};
use rtd_common::host::{Activation, CallResult, HostConnector};

use crate::faults::FaultPlan;
use crate::host::SimulatedHost;
use crate::model::feed::FeedConfig;
use crate::probe::Probe;

/// Connector producing simulated hosts.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    registered: Vec<String>,
    failing: HashSet<Activation>,
    threading_fails: bool,
    feed: FeedConfig,
    faults: FaultPlan,
    probe: Probe,
}

impl SimulatedConnector {
    /// Connector with the default application registered and `feed` as provider.
    pub fn new(feed: FeedConfig) -> Self {
        SimulatedConnector {
            registered: vec![defaults::HOST_APP.to_string()],
            failing: HashSet::new(),
            threading_fails: false,
            feed,
            faults: FaultPlan::new(),
            probe: Probe::new(),
        }
    }

    /// Registers an extra application identifier.
    pub fn register(mut self, host_app: &str) -> Self {
        self.registered.push(host_app.to_string());
        self
    }

    /// Makes activation through `strategy` fail.
    pub fn failing_activation(mut self, strategy: Activation) -> Self {
        self.failing.insert(strategy);
        self
    }

    /// Makes thread setup fail.
    pub fn failing_threading(mut self) -> Self {
        self.threading_fails = true;
        self
    }

    /// Fault plan installed into the activated host.
    pub fn with_faults(mut self, faults: FaultPlan) -> Self {
        self.faults = faults;
        self
    }

    /// Probe shared with every host this connector activates.
    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl HostConnector for SimulatedConnector {
    type Host = SimulatedHost;

    fn init_threading(&mut self) -> CallResult<()> {
        if self.threading_fails {
            return Err(HostCallError::failed("init_threading", E_FAIL, "threading setup refused"));
        }
        self.probe.record(|p| p.threading_inits += 1);
        Ok(())
    }

    fn activate(&mut self, host_app: &str, strategy: Activation) -> CallResult<SimulatedHost> {
        let outcome = if !self.registered.iter().any(|id| id.eq_ignore_ascii_case(host_app)) {
            Err(HostCallError::failed(
                "activate",
                REGDB_E_CLASSNOTREG,
                format!("class `{host_app}` not registered"),
            ))
        } else if self.failing.contains(&strategy) {
            Err(HostCallError::failed(
                "activate",
                E_FAIL,
                format!("{strategy} activation refused"),
            ))
        } else {
            Ok(SimulatedHost::new(
                self.feed.clone(),
                self.faults.clone(),
                self.probe.clone(),
            ))
        };
        let succeeded = outcome.is_ok();
        self.probe.record(|p| p.activations.push((strategy, succeeded)));
        debug!("Simulated activation of {} via {}: {}", host_app, strategy, succeeded);
        outcome
    }

    fn clear_metadata_cache(&mut self) -> CallResult<()> {
        self.probe.record(|p| p.cache_clears += 1);
        Ok(())
    }

    fn release_threading(&mut self) {
        self.probe.record(|p| p.threading_releases += 1);
    }
}
