//! Host session lifecycle.
//!
//! A `HostSession` exclusively owns the activated application, its scratch
//! document and that document's first sheet for the duration of one request.
//! Teardown runs exactly once: either through [`HostSession::close`] or, if the
//! owner never calls it, when the session is dropped.
//!
//! Opening follows the activation strategies in [`Activation`] order. The
//! application is hidden and its alerts are suppressed before any document is
//! created; a single stray dialog would block every later call.
use log::{debug, info, warn};
use strum::IntoEnumIterator;

use crate::error::{HostCallError, SnapshotError};
use crate::host::{Activation, AutomationHost, HostConnector};
use crate::result::Result;

type Document<C> = <<C as HostConnector>::Host as AutomationHost>::Document;
type Sheet<C> = <<C as HostConnector>::Host as AutomationHost>::Sheet;

/// Mutable host together with the scratch sheet it owns.
pub struct Workspace<'s, H: AutomationHost> {
    /// Live application.
    pub host: &'s mut H,
    /// First sheet of the scratch document.
    pub sheet: &'s H::Sheet,
}

/// Exclusive connection to one automation host.
pub struct HostSession<C: HostConnector> {
    connector: C,
    host: Option<C::Host>,
    document: Option<Document<C>>,
    sheet: Option<Sheet<C>>,
    threading: bool,
    closed: bool,
}

impl<C: HostConnector> HostSession<C> {
    /// Activates `host_app`, configures it and creates the blank scratch document.
    ///
    /// Returns `SnapshotError::HostUnavailable` when every activation strategy
    /// fails. Anything acquired before a failure is torn down before returning.
    pub fn open(connector: C, host_app: &str) -> Result<Self> {
        let mut session = HostSession {
            connector,
            host: None,
            document: None,
            sheet: None,
            threading: false,
            closed: false,
        };
        match session.acquire(host_app) {
            Ok(()) => Ok(session),
            Err(e) => {
                session.close();
                Err(e)
            }
        }
    }

    fn acquire(&mut self, host_app: &str) -> Result<()> {
        self.connector
            .init_threading()
            .map_err(|e| unavailable(host_app, 0, e))?;
        self.threading = true;

        let mut host = self.activate(host_app)?;
        let configured = host
            .set_visible(false)
            .map_err(|e| SnapshotError::fault("hide host window", e))
            .and_then(|_| {
                host.set_alerts_suppressed(true)
                    .map_err(|e| SnapshotError::fault("suppress host alerts", e))
            });
        let host = self.host.insert(host);
        configured?;

        let document = host
            .create_blank_document()
            .map_err(|e| SnapshotError::fault("create scratch document", e))?;
        let document = self.document.insert(document);
        let sheet = host
            .first_sheet(document)
            .map_err(|e| SnapshotError::fault("open first sheet", e))?;
        self.sheet = Some(sheet);
        info!("Host session opened on {}", host_app);
        Ok(())
    }

    fn activate(&mut self, host_app: &str) -> Result<C::Host> {
        let mut attempts = 0;
        let mut last = None;
        for strategy in Activation::iter() {
            attempts += 1;
            if strategy.clears_cache() {
                if let Err(e) = self.connector.clear_metadata_cache() {
                    warn!("Clearing cached host metadata failed: {}", e);
                }
            }
            match self.connector.activate(host_app, strategy) {
                Ok(host) => {
                    debug!("Activated {} via {}", host_app, strategy);
                    return Ok(host);
                }
                Err(e) => {
                    warn!("Activation of {} via {} failed: {}", host_app, strategy, e);
                    last = Some(e);
                }
            }
        }
        let last = last.unwrap_or_else(|| {
            HostCallError::failed("activate", crate::error::E_FAIL, "no activation strategy")
        });
        Err(unavailable(host_app, attempts, last))
    }

    /// Host and scratch sheet, for issuing cell calls.
    pub fn workspace(&mut self) -> Result<Workspace<'_, C::Host>> {
        match (self.host.as_mut(), self.sheet.as_ref()) {
            (Some(host), Some(sheet)) if !self.closed => Ok(Workspace { host, sheet }),
            _ => Err(SnapshotError::fault(
                "access scratch sheet",
                HostCallError::failed("worksheet", crate::error::E_FAIL, "session is not open"),
            )),
        }
    }

    /// Whether teardown already ran.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Best-effort teardown. Never fails and runs its steps at most once.
    ///
    /// The scratch document is discarded without saving, the application is
    /// terminated and the threading setup is released. Each step runs even if
    /// the previous one failed.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.sheet = None;

        if let Some(host) = self.host.as_mut() {
            if let Some(document) = self.document.take() {
                if let Err(e) = host.close_document(&document, false) {
                    warn!("Discarding scratch document failed: {}", e);
                }
            }
            if let Err(e) = host.quit() {
                warn!("Terminating host failed: {}", e);
            }
        }
        self.host = None;

        if self.threading {
            self.connector.release_threading();
            self.threading = false;
        }
        debug!("Host session closed");
    }
}

impl<C: HostConnector> Drop for HostSession<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn unavailable(host_app: &str, attempts: usize, last: HostCallError) -> SnapshotError {
    SnapshotError::HostUnavailable {
        host_app: host_app.to_string(),
        attempts,
        last,
    }
}
