//! Lazily connected MediaMonkey handle

use crate::host::AutomationHost;
use crate::{AutomationError, MediaMonkey};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

type Connector = dyn Fn() -> Result<Arc<dyn AutomationHost>, AutomationError> + Send + Sync;

/// Owns the connection to MediaMonkey on behalf of a long-running caller.
///
/// Nothing is connected until the first call. The handle is then reused
/// until an operation reports [`AutomationError::Unavailable`], at which
/// point it is dropped and the next call connects again. There is no
/// teardown beyond dropping the session.
pub struct Session {
    connector: Box<Connector>,
    current: Mutex<Option<MediaMonkey>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Session {
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn AutomationHost>, AutomationError> + Send + Sync + 'static,
    {
        Self {
            connector: Box::new(connector),
            current: Mutex::new(None),
        }
    }

    /// Session over the platform automation surface.
    pub fn with_options(options: crate::ConnectOptions) -> Self {
        Self::new(move || crate::platforms::connect(&options))
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<MediaMonkey>> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_connected(&self) -> bool {
        self.slot().is_some()
    }

    /// The cached handle, connecting first if needed.
    pub fn get(&self) -> Result<MediaMonkey, AutomationError> {
        let mut slot = self.slot();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        let handle = MediaMonkey::from_host((self.connector)()?);
        info!("MediaMonkey session established");
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Forget the cached handle.
    pub fn reset(&self) {
        if self.slot().take().is_some() {
            info!("MediaMonkey session reset");
        }
    }

    /// Run `op` against the handle, resetting the session when the host
    /// turns out to be gone.
    pub fn run<T>(
        &self,
        op: impl FnOnce(&MediaMonkey) -> Result<T, AutomationError>,
    ) -> Result<T, AutomationError> {
        let handle = self.get()?;
        let result = op(&handle);
        if let Err(e) = &result {
            if e.is_unavailable() {
                warn!("MediaMonkey became unavailable: {}", e);
                self.reset();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::MemoryHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_session(host: Arc<MemoryHost>) -> (Session, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = connects.clone();
        let session = Session::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(host.clone() as Arc<dyn AutomationHost>)
        });
        (session, connects)
    }

    #[test]
    fn connects_lazily_and_once() {
        let (session, connects) = counting_session(Arc::new(MemoryHost::new()));
        assert!(!session.is_connected());
        assert_eq!(connects.load(Ordering::SeqCst), 0);

        session.run(|mm| mm.playback_state()).unwrap();
        session.run(|mm| mm.playback_state()).unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_host_resets_the_session() {
        let host = Arc::new(MemoryHost::new());
        let (session, connects) = counting_session(host.clone());

        session.run(|mm| mm.playback_state()).unwrap();
        host.set_unavailable(true);
        let err = session.run(|mm| mm.playback_state()).unwrap_err();
        assert!(err.is_unavailable());
        assert!(!session.is_connected());

        host.set_unavailable(false);
        session.run(|mm| mm.playback_state()).unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn other_errors_keep_the_session() {
        let (session, _) = counting_session(Arc::new(MemoryHost::new()));
        let err = session.run(|mm| mm.run_js("", true)).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidArgument(_)));
        assert!(session.is_connected());
    }

    #[test]
    fn failed_connect_is_retried_next_time() {
        let session = Session::new(|| Err(AutomationError::Unavailable("not installed".into())));
        assert!(session.get().is_err());
        assert!(session.get().is_err());
        assert!(!session.is_connected());
    }
}
