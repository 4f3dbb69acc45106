use crate::host::AutomationHost;
use crate::AutomationError;
use std::sync::Arc;
use tracing::debug;

pub mod memory;
#[cfg(target_os = "windows")]
pub mod windows;

/// ProgID registered by MediaMonkey 5 and MediaMonkey 2024.
pub const DEFAULT_PROG_ID: &str = "SongsDB5.SDBApplication";

/// Environment variable overriding [`DEFAULT_PROG_ID`].
pub const PROG_ID_ENV: &str = "MM2024_COM_PROGID";

/// How to reach the MediaMonkey automation server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub prog_id: String,
    /// Ask MediaMonkey to keep running after the last client disconnects
    /// (`ShutdownAfterDisconnect = false`). Builds without the property are
    /// tolerated.
    pub keep_alive: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            prog_id: DEFAULT_PROG_ID.to_string(),
            keep_alive: true,
        }
    }
}

impl ConnectOptions {
    /// Defaults, with the ProgID taken from `MM2024_COM_PROGID` when set.
    pub fn from_env() -> Self {
        let prog_id = std::env::var(PROG_ID_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PROG_ID.to_string());
        Self {
            prog_id,
            ..Self::default()
        }
    }
}

/// Member names tried, in order, for a menu item's child collection.
pub const CHILD_COLLECTIONS: [&str; 2] = ["SubItems", "Items"];

/// First collection `read_member` yields among `members`.
///
/// A member that fails to read is logged and the next one is tried; only
/// [`AutomationError::Unavailable`] stops the search.
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
pub(crate) fn first_collection<T>(
    members: &[&str],
    mut read_member: impl FnMut(&str) -> Result<Option<T>, AutomationError>,
) -> Result<Option<T>, AutomationError> {
    for &member in members {
        match read_member(member) {
            Ok(Some(collection)) => return Ok(Some(collection)),
            Ok(None) => {}
            Err(e) if e.is_unavailable() => return Err(e),
            Err(e) => debug!("{} unreadable, trying next collection: {}", member, e),
        }
    }
    Ok(None)
}

/// Connect to MediaMonkey through the current platform's automation surface.
pub fn connect(options: &ConnectOptions) -> Result<Arc<dyn AutomationHost>, AutomationError> {
    #[cfg(target_os = "windows")]
    {
        Ok(Arc::new(windows::ComHost::connect(options)?))
    }
    #[cfg(not(target_os = "windows"))]
    {
        Err(AutomationError::Unavailable(format!(
            "COM automation ('{}') is only available on Windows",
            options.prog_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_mediamonkey_alive() {
        let options = ConnectOptions::default();
        assert_eq!(options.prog_id, DEFAULT_PROG_ID);
        assert!(options.keep_alive);
    }

    #[test]
    fn failing_sub_items_fall_back_to_items() {
        let mut visited = Vec::new();
        let found = first_collection(&CHILD_COLLECTIONS, |member| {
            visited.push(member.to_string());
            match member {
                "SubItems" => Err(AutomationError::PlatformError("SubItems raised".into())),
                _ => Ok(Some(member.to_string())),
            }
        })
        .unwrap();
        assert_eq!(found.as_deref(), Some("Items"));
        assert_eq!(visited, vec!["SubItems", "Items"]);
    }

    #[test]
    fn absent_collections_yield_none() {
        let found = first_collection::<()>(&CHILD_COLLECTIONS, |_| Ok(None)).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn unavailable_host_stops_the_search() {
        let mut calls = 0;
        let err = first_collection::<()>(&CHILD_COLLECTIONS, |_| {
            calls += 1;
            Err(AutomationError::Unavailable("gone".into()))
        })
        .unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(calls, 1);
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn connecting_off_windows_reports_unavailable() {
        let err = connect(&ConnectOptions::default()).unwrap_err();
        assert!(err.is_unavailable());
    }
}
