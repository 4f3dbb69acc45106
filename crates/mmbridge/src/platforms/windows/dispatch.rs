//! Late-bound `IDispatch` calls and `VARIANT` conversion

use crate::types::HostValue;
use crate::AutomationError;
use windows::core::{Interface, BSTR, GUID, HRESULT, IUnknown, PCWSTR, VARIANT};
use windows::Win32::Foundation::{
    CO_E_SERVER_EXEC_FAILURE, DISP_E_BADPARAMCOUNT, DISP_E_EXCEPTION, DISP_E_MEMBERNOTFOUND,
    DISP_E_PARAMNOTOPTIONAL, DISP_E_UNKNOWNNAME, RPC_E_DISCONNECTED, RPC_E_SERVERFAULT,
};
use windows::Win32::System::Com::{
    IDispatch, DISPATCH_FLAGS, DISPATCH_METHOD, DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT,
    DISPPARAMS, EXCEPINFO,
};
use windows::Win32::System::Ole::DISPID_PROPERTYPUT;
use windows::Win32::System::Variant::{
    VT_BOOL, VT_DISPATCH, VT_EMPTY, VT_I1, VT_I2, VT_I4, VT_I8, VT_INT, VT_NULL, VT_R4,
    VT_R8, VT_UI1, VT_UI2, VT_UI4, VT_UI8, VT_UINT, VT_UNKNOWN,
};

/// 0x800706BA, RPC_S_SERVER_UNAVAILABLE as an HRESULT
const RPC_SERVER_UNAVAILABLE: HRESULT = HRESULT(0x800706BAu32 as i32);
const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// Map a COM failure on `member` to the crate's error kinds.
pub(crate) fn map_com_error(member: &str, error: &windows::core::Error) -> AutomationError {
    let code = error.code();
    if code == DISP_E_BADPARAMCOUNT || code == DISP_E_PARAMNOTOPTIONAL {
        AutomationError::SignatureMismatch(format!("{member}: {error}"))
    } else if code == DISP_E_UNKNOWNNAME || code == DISP_E_MEMBERNOTFOUND {
        AutomationError::UnsupportedOperation(format!("{member} is not exposed"))
    } else if code == RPC_E_DISCONNECTED
        || code == RPC_SERVER_UNAVAILABLE
        || code == RPC_E_SERVERFAULT
        || code == CO_E_SERVER_EXEC_FAILURE
    {
        AutomationError::Unavailable(format!("{member}: {error}"))
    } else {
        AutomationError::PlatformError(format!("{member} failed: {error}"))
    }
}

/// An `IDispatch` pointer that can cross threads.
///
/// The objects come from an out-of-process server and are used from the
/// multithreaded apartment only, so the proxies are free-threaded.
#[derive(Clone, Debug)]
pub(crate) struct Dispatch(IDispatch);

unsafe impl Send for Dispatch {}
unsafe impl Sync for Dispatch {}

impl Dispatch {
    pub(crate) fn new(inner: IDispatch) -> Self {
        Self(inner)
    }

    fn dispid(&self, member: &str) -> Result<i32, windows::core::Error> {
        let wide: Vec<u16> = member.encode_utf16().chain(std::iter::once(0)).collect();
        let names = [PCWSTR(wide.as_ptr())];
        let mut dispid = 0i32;
        unsafe {
            self.0.GetIDsOfNames(
                &GUID::zeroed(),
                names.as_ptr(),
                1,
                LOCALE_USER_DEFAULT,
                &mut dispid,
            )?;
        }
        Ok(dispid)
    }

    /// Whether the object exposes `member` at all.
    pub(crate) fn has_member(&self, member: &str) -> bool {
        self.dispid(member).is_ok()
    }

    fn invoke(
        &self,
        member: &str,
        flags: DISPATCH_FLAGS,
        args: &[VARIANT],
        put_value: Option<&VARIANT>,
    ) -> Result<VARIANT, AutomationError> {
        let dispid = self.dispid(member).map_err(|e| map_com_error(member, &e))?;

        // Arguments travel right to left; the value of a put goes first.
        let mut rgvarg: Vec<VARIANT> = Vec::with_capacity(args.len() + 1);
        if let Some(value) = put_value {
            rgvarg.push(value.clone());
        }
        rgvarg.extend(args.iter().rev().cloned());

        let mut named = [DISPID_PROPERTYPUT];
        let params = DISPPARAMS {
            rgvarg: if rgvarg.is_empty() {
                std::ptr::null_mut()
            } else {
                rgvarg.as_mut_ptr()
            },
            rgdispidNamedArgs: if put_value.is_some() {
                named.as_mut_ptr()
            } else {
                std::ptr::null_mut()
            },
            cArgs: rgvarg.len() as u32,
            cNamedArgs: u32::from(put_value.is_some()),
        };

        let mut result = VARIANT::default();
        let mut excepinfo = EXCEPINFO::default();
        let outcome = unsafe {
            self.0.Invoke(
                dispid,
                &GUID::zeroed(),
                LOCALE_USER_DEFAULT,
                flags,
                &params,
                Some(&mut result as *mut VARIANT),
                Some(&mut excepinfo as *mut EXCEPINFO),
                None,
            )
        };

        match outcome {
            Ok(()) => Ok(result),
            Err(e) if e.code() == DISP_E_EXCEPTION => {
                let description = excepinfo.bstrDescription.to_string();
                if description.is_empty() {
                    Err(map_com_error(member, &e))
                } else {
                    Err(AutomationError::PlatformError(format!(
                        "{member} raised: {description}"
                    )))
                }
            }
            Err(e) => Err(map_com_error(member, &e)),
        }
    }

    pub(crate) fn get(&self, member: &str) -> Result<VARIANT, AutomationError> {
        self.invoke(member, DISPATCH_PROPERTYGET, &[], None)
    }

    /// Indexed property read such as `Item(i)` or `StringValue(section, key)`.
    pub(crate) fn get_indexed(&self, member: &str, args: &[VARIANT]) -> Result<VARIANT, AutomationError> {
        self.invoke(member, DISPATCH_PROPERTYGET | DISPATCH_METHOD, args, None)
    }

    pub(crate) fn put(&self, member: &str, value: VARIANT) -> Result<(), AutomationError> {
        self.put_indexed(member, &[], value)
    }

    pub(crate) fn put_indexed(
        &self,
        member: &str,
        args: &[VARIANT],
        value: VARIANT,
    ) -> Result<(), AutomationError> {
        self.invoke(member, DISPATCH_PROPERTYPUT, args, Some(&value))
            .map(|_| ())
    }

    pub(crate) fn call(&self, member: &str, args: &[VARIANT]) -> Result<VARIANT, AutomationError> {
        self.invoke(member, DISPATCH_METHOD, args, None)
    }

    pub(crate) fn get_value(&self, member: &str) -> Result<HostValue, AutomationError> {
        self.get(member).map(|v| to_host_value(&v))
    }

    /// Property holding another automation object; `Ok(None)` for null.
    pub(crate) fn get_object(&self, member: &str) -> Result<Option<Dispatch>, AutomationError> {
        let variant = self.get(member)?;
        to_dispatch(member, &variant)
    }
}

fn vt(variant: &VARIANT) -> u16 {
    unsafe { variant.as_raw().Anonymous.Anonymous.vt }
}

pub(crate) fn to_dispatch(
    member: &str,
    variant: &VARIANT,
) -> Result<Option<Dispatch>, AutomationError> {
    let kind = vt(variant);
    if kind == VT_EMPTY.0 || kind == VT_NULL.0 {
        return Ok(None);
    }
    if kind != VT_DISPATCH.0 && kind != VT_UNKNOWN.0 {
        return Err(AutomationError::PlatformError(format!(
            "{member} did not return an object"
        )));
    }
    let unknown = IUnknown::try_from(variant).map_err(|e| map_com_error(member, &e))?;
    let dispatch = unknown
        .cast::<IDispatch>()
        .map_err(|e| map_com_error(member, &e))?;
    Ok(Some(Dispatch::new(dispatch)))
}

/// Decode a `VARIANT` by its runtime type.
pub(crate) fn to_host_value(variant: &VARIANT) -> HostValue {
    let kind = vt(variant);
    let ints = [
        VT_I1.0, VT_I2.0, VT_I4.0, VT_I8.0, VT_INT.0, VT_UI1.0, VT_UI2.0, VT_UI4.0, VT_UI8.0,
        VT_UINT.0,
    ];

    if kind == VT_EMPTY.0 || kind == VT_NULL.0 {
        HostValue::Empty
    } else if kind == VT_BOOL.0 {
        bool::try_from(variant).map_or(HostValue::Empty, HostValue::Bool)
    } else if ints.contains(&kind) {
        i64::try_from(variant).map_or(HostValue::Empty, HostValue::Int)
    } else if kind == VT_R4.0 || kind == VT_R8.0 {
        f64::try_from(variant).map_or(HostValue::Empty, HostValue::Float)
    } else {
        // BSTR, plus dates and currency rendered as text by OLE.
        BSTR::try_from(variant).map_or(HostValue::Empty, |s| HostValue::Str(s.to_string()))
    }
}

pub(crate) fn from_host_value(value: &HostValue) -> VARIANT {
    match value {
        HostValue::Empty => VARIANT::default(),
        HostValue::Bool(b) => VARIANT::from(*b),
        HostValue::Int(i) => match i32::try_from(*i) {
            Ok(small) => VARIANT::from(small),
            Err(_) => VARIANT::from(*i),
        },
        HostValue::Float(f) => VARIANT::from(*f),
        HostValue::Str(s) => VARIANT::from(BSTR::from(s.as_str())),
    }
}

pub(crate) fn str_arg(text: &str) -> VARIANT {
    VARIANT::from(BSTR::from(text))
}
