//! Late-bound `IDispatch` calls and `VARIANT` conversions.
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::ptr;
use std::rc::Rc;
use std::slice;

use log::trace;
use rtd_common::RawValue;
use rtd_common::host::CallResult;
use windows::Win32::System::Com::{
    DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
    EXCEPINFO, IDispatch,
};
use windows::core::{BSTR, GUID, HSTRING, Interface, PCWSTR, VARIANT};

use crate::codes::{call_error, cell_error_value};

/// `LOCALE_USER_DEFAULT`.
const LOCALE: u32 = 0x0400;
/// Named argument carrying the assigned value of a property put.
const DISPID_PROPERTYPUT: i32 = -3;
/// Status returned when `Invoke` reports the failure through `EXCEPINFO`.
const DISP_E_EXCEPTION: i32 = 0x8002_0009_u32 as i32;
/// Status of a `VARIANT` whose type is not the expected one.
const DISP_E_TYPEMISMATCH: i32 = 0x8002_0005_u32 as i32;

const VT_EMPTY: u16 = 0;
const VT_NULL: u16 = 1;
const VT_I2: u16 = 2;
const VT_I4: u16 = 3;
const VT_R4: u16 = 4;
const VT_R8: u16 = 5;
const VT_CY: u16 = 6;
const VT_DATE: u16 = 7;
const VT_BSTR: u16 = 8;
const VT_DISPATCH: u16 = 9;
const VT_ERROR: u16 = 10;
const VT_BOOL: u16 = 11;

/// DISPIDs resolved so far, keyed by `"<object>.<member>"`.
pub(crate) type DispIdCache = Rc<RefCell<HashMap<String, i32>>>;

/// One automation object together with how its member names are resolved.
#[derive(Clone)]
pub(crate) struct Dispatch {
    inner: IDispatch,
    object: &'static str,
    cache: Option<DispIdCache>,
}

impl Dispatch {
    pub(crate) fn new(inner: IDispatch, object: &'static str, cache: Option<DispIdCache>) -> Self {
        Dispatch {
            inner,
            object,
            cache,
        }
    }

    /// Reads property `member`, passing `args` as its parameters.
    pub(crate) fn get(&self, member: &str, args: &[VARIANT]) -> CallResult<VARIANT> {
        self.invoke(member, DISPATCH_PROPERTYGET, args, false)
    }

    /// Assigns `value` to property `member`.
    pub(crate) fn put(&self, member: &str, value: VARIANT) -> CallResult<()> {
        self.invoke(member, DISPATCH_PROPERTYPUT, &[value], true)
            .map(|_| ())
    }

    /// Calls method `member`.
    pub(crate) fn call(&self, member: &str, args: &[VARIANT]) -> CallResult<VARIANT> {
        self.invoke(member, DISPATCH_METHOD | DISPATCH_PROPERTYGET, args, false)
    }

    /// Object returned by property or method `member`, seen as `object`.
    pub(crate) fn child(
        &self,
        member: &str,
        args: &[VARIANT],
        object: &'static str,
    ) -> CallResult<Dispatch> {
        let value = self.call(member, args)?;
        let inner = dispatch_of(&value).ok_or_else(|| {
            call_error(member, DISP_E_TYPEMISMATCH, "result is not an automation object")
        })?;
        Ok(Dispatch::new(inner, object, self.cache.clone()))
    }

    /// Whether the object exposes type information.
    pub(crate) fn has_type_info(&self) -> CallResult<bool> {
        let count = unsafe { self.inner.GetTypeInfoCount() }
            .map_err(|e| call_error("GetTypeInfoCount", e.code().0, &e.message().to_string()))?;
        Ok(count > 0)
    }

    fn dispid(&self, member: &str) -> CallResult<i32> {
        let key = format!("{}.{}", self.object, member);
        if let Some(cache) = &self.cache {
            if let Some(dispid) = cache.borrow().get(&key) {
                return Ok(*dispid);
            }
        }
        let name = HSTRING::from(member);
        let names = [PCWSTR(name.as_ptr())];
        let mut dispid = 0;
        unsafe {
            self.inner
                .GetIDsOfNames(&GUID::zeroed(), names.as_ptr(), 1, LOCALE, &mut dispid)
        }
        .map_err(|e| call_error(&key, e.code().0, &e.message().to_string()))?;
        if let Some(cache) = &self.cache {
            cache.borrow_mut().insert(key, dispid);
        }
        Ok(dispid)
    }

    fn invoke(
        &self,
        member: &str,
        flags: DISPATCH_FLAGS,
        args: &[VARIANT],
        assign: bool,
    ) -> CallResult<VARIANT> {
        let dispid = self.dispid(member)?;
        // positional arguments travel last to first
        let mut args: Vec<VARIANT> = args.iter().rev().cloned().collect();
        let mut named = DISPID_PROPERTYPUT;
        let params = DISPPARAMS {
            rgvarg: args.as_mut_ptr(),
            rgdispidNamedArgs: if assign { &mut named } else { ptr::null_mut() },
            cArgs: args.len() as u32,
            cNamedArgs: u32::from(assign),
        };
        let mut result = VARIANT::default();
        let mut exception = Exception::default();
        trace!("Invoke {}.{}", self.object, member);
        let outcome = unsafe {
            self.inner.Invoke(
                dispid,
                &GUID::zeroed(),
                LOCALE,
                flags,
                &params,
                Some(&mut result),
                Some(&mut exception.0),
                None,
            )
        };
        match outcome {
            Ok(()) => Ok(result),
            Err(e) if e.code().0 == DISP_E_EXCEPTION => {
                let (code, message) = exception.describe(e.code().0);
                Err(call_error(member, code, &message))
            }
            Err(e) => Err(call_error(member, e.code().0, &e.message().to_string())),
        }
    }
}

/// `EXCEPINFO` that frees its strings.
#[derive(Default)]
struct Exception(EXCEPINFO);

impl Exception {
    fn describe(&self, fallback: i32) -> (i32, String) {
        let code = if self.0.scode != 0 { self.0.scode } else { fallback };
        let source = self.0.bstrSource.to_string();
        let description = self.0.bstrDescription.to_string();
        let message = match (source.is_empty(), description.is_empty()) {
            (_, true) => "exception raised by the host".to_string(),
            (true, false) => description,
            (false, false) => format!("{source}: {description}"),
        };
        (code, message)
    }
}

impl Drop for Exception {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.0.bstrSource);
            ManuallyDrop::drop(&mut self.0.bstrDescription);
            ManuallyDrop::drop(&mut self.0.bstrHelpFile);
        }
    }
}

/// Automation value for a literal cell write.
pub(crate) fn variant_of(value: &RawValue) -> VARIANT {
    match value {
        RawValue::Empty => VARIANT::default(),
        RawValue::Number(n) => VARIANT::from(*n),
        RawValue::Bool(b) => VARIANT::from(*b),
        RawValue::Text(text) => VARIANT::from(BSTR::from(text.as_str())),
    }
}

/// Converts a cell value read from the host.
pub(crate) fn raw_value(value: &VARIANT) -> CallResult<RawValue> {
    let raw = value.as_raw();
    unsafe {
        let data = &raw.Anonymous.Anonymous;
        let payload = &data.Anonymous;
        let converted = match data.vt {
            VT_EMPTY | VT_NULL => RawValue::Empty,
            VT_R8 => RawValue::Number(payload.dblVal),
            VT_R4 => RawValue::Number(f64::from(payload.fltVal)),
            VT_I4 => RawValue::Number(f64::from(payload.lVal)),
            VT_I2 => RawValue::Number(f64::from(payload.iVal)),
            VT_DATE => RawValue::Number(payload.date),
            // currency is a fixed-point integer scaled by 10 000
            VT_CY => RawValue::Number(payload.cyVal.int64 as f64 / 10_000.0),
            VT_BOOL => RawValue::Bool(payload.boolVal != 0),
            VT_BSTR => RawValue::Text(bstr_text(payload.bstrVal)),
            VT_ERROR => cell_error_value(payload.scode),
            other => {
                return Err(call_error(
                    "Value",
                    DISP_E_TYPEMISMATCH,
                    &format!("unsupported value type {other}"),
                ));
            }
        };
        Ok(converted)
    }
}

fn dispatch_of(value: &VARIANT) -> Option<IDispatch> {
    let raw = value.as_raw();
    unsafe {
        let data = &raw.Anonymous.Anonymous;
        if data.vt != VT_DISPATCH {
            return None;
        }
        let pointer: *mut c_void = data.Anonymous.pdispVal;
        IDispatch::from_raw_borrowed(&pointer).cloned()
    }
}

/// Copies a `BSTR` without taking ownership; the length prefix counts bytes.
unsafe fn bstr_text(bstr: *const u16) -> String {
    if bstr.is_null() {
        return String::new();
    }
    unsafe {
        let bytes = *(bstr as *const u32).sub(1) as usize;
        String::from_utf16_lossy(slice::from_raw_parts(bstr, bytes / 2))
    }
}
