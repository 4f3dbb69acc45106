//! MediaMonkey over COM automation (`SongsDB5.SDBApplication`)

mod dispatch;
mod host;

pub use host::ComHost;

use crate::AutomationError;
use std::cell::Cell;
use tracing::error;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_MULTITHREADED};

/// 0x80010106, RPC_E_CHANGED_MODE: the thread already joined another apartment.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

thread_local! {
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

/// Join the multithreaded apartment once per thread.
pub(crate) fn ensure_com_initialized() -> Result<(), AutomationError> {
    if COM_READY.with(Cell::get) {
        return Ok(());
    }
    let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
    if hr.is_err() && hr != RPC_E_CHANGED_MODE {
        error!("Failed to initialize COM: {:?}", hr);
        return Err(AutomationError::Unavailable(format!(
            "COM initialization failed: {hr:?}"
        )));
    }
    COM_READY.with(|ready| ready.set(true));
    Ok(())
}
