//! COM runtime entry point: apartment setup and application activation.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};
use rtd_common::error::E_FAIL;
use rtd_common::host::{Activation, CallResult, HostConnector};
use windows::Win32::System::Com::{
    CLSCTX_LOCAL_SERVER, CLSIDFromProgID, COINIT_APARTMENTTHREADED, CoCreateInstance,
    CoInitializeEx, CoUninitialize, IDispatch,
};
use windows::core::{HSTRING, PCWSTR};

use crate::codes::call_error;
use crate::dispatch::{DispIdCache, Dispatch};
use crate::host::ComHost;

/// Activates the spreadsheet application as an out-of-process COM server.
///
/// Early-bound strategies resolve member names once through a shared cache;
/// `Activation::LateBound` resolves them on every call and never touches the
/// cache. Clearing the cache forces names to be looked up again.
pub struct ComConnector {
    cache: DispIdCache,
    initialized: bool,
}

impl ComConnector {
    /// Connector with an empty name cache.
    pub fn new() -> Self {
        ComConnector {
            cache: Rc::new(RefCell::new(HashMap::new())),
            initialized: false,
        }
    }
}

impl Default for ComConnector {
    fn default() -> Self {
        ComConnector::new()
    }
}

impl HostConnector for ComConnector {
    type Host = ComHost;

    fn init_threading(&mut self) -> CallResult<()> {
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| call_error("CoInitializeEx", e.code().0, &e.message().to_string()))?;
        self.initialized = true;
        Ok(())
    }

    fn activate(&mut self, host_app: &str, strategy: Activation) -> CallResult<ComHost> {
        let prog_id = HSTRING::from(host_app);
        let clsid = unsafe { CLSIDFromProgID(PCWSTR(prog_id.as_ptr())) }
            .map_err(|e| call_error("CLSIDFromProgID", e.code().0, &e.message().to_string()))?;
        let app: IDispatch = unsafe { CoCreateInstance(&clsid, None, CLSCTX_LOCAL_SERVER) }
            .map_err(|e| call_error("CoCreateInstance", e.code().0, &e.message().to_string()))?;

        let cache = match strategy {
            Activation::LateBound => None,
            Activation::CachedTypeInfo | Activation::RegeneratedTypeInfo => {
                Some(self.cache.clone())
            }
        };
        let app = Dispatch::new(app, "Application", cache);
        if strategy != Activation::LateBound && !app.has_type_info()? {
            return Err(call_error(
                "GetTypeInfoCount",
                E_FAIL,
                &format!("{host_app} exposes no type information"),
            ));
        }
        debug!("{} activated as a local server via {}", host_app, strategy);
        Ok(ComHost::new(app))
    }

    fn clear_metadata_cache(&mut self) -> CallResult<()> {
        let dropped = self.cache.borrow().len();
        self.cache.borrow_mut().clear();
        info!("Cleared {} cached member ids", dropped);
        Ok(())
    }

    fn release_threading(&mut self) {
        if self.initialized {
            unsafe { CoUninitialize() };
            self.initialized = false;
        }
    }
}
