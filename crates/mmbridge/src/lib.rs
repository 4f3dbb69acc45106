//! MediaMonkey automation through its COM surface
//!
//! Resolves human-readable menu paths against the live menu tree and fires
//! the item they name, reads and writes INI settings with type coercion, and
//! drives the player. Everything is expressed against the capability traits
//! in [`host`], so the same engine runs over COM on Windows and over the
//! in-memory host in tests.

use std::sync::Arc;
use tracing::instrument;

pub mod errors;
pub mod host;
pub mod ini;
pub mod menu;
pub mod platforms;
pub mod player;
pub mod script;
pub mod session;
pub mod types;

pub use errors::AutomationError;
pub use host::{AutomationHost, MenuNode, MenuNodeRef, TriggerMechanism};
pub use ini::{ConfigRequest, ConfigValue, IniValue, IniValueType, PersistMode};
pub use menu::{MatchStrategy, MenuInvocationResult, MenuPathRequest};
pub use platforms::ConnectOptions;
pub use player::{PlaybackAction, PlaybackState, TrackInfo};
pub use session::Session;
pub use types::HostValue;

/// Handle to a connected MediaMonkey instance.
///
/// Cheap to clone; every clone talks to the same host.
#[derive(Clone, Debug)]
pub struct MediaMonkey {
    host: Arc<dyn AutomationHost>,
}

impl MediaMonkey {
    /// Connect through the platform automation surface.
    #[instrument(skip(options), fields(prog_id = %options.prog_id))]
    pub fn connect(options: &ConnectOptions) -> Result<Self, AutomationError> {
        let host = platforms::connect(options)?;
        Ok(Self { host })
    }

    pub fn from_host(host: Arc<dyn AutomationHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &dyn AutomationHost {
        &*self.host
    }

    pub fn invoke_menu_item(
        &self,
        request: &MenuPathRequest,
    ) -> Result<MenuInvocationResult, AutomationError> {
        menu::invoke_menu_item(&*self.host, request)
    }

    pub fn configure(&self, request: &ConfigRequest) -> Result<ConfigValue, AutomationError> {
        ini::access_config_value(&*self.host, request)
    }

    pub fn playback_state(&self) -> Result<PlaybackState, AutomationError> {
        player::playback_state(&*self.host)
    }

    pub fn control_playback(&self, action: PlaybackAction) -> Result<PlaybackState, AutomationError> {
        player::control_playback(&*self.host, action)
    }

    pub fn set_volume(&self, level: i64) -> Result<PlaybackState, AutomationError> {
        player::set_volume(&*self.host, level)
    }

    pub fn seek(&self, position_ms: i64) -> Result<PlaybackState, AutomationError> {
        player::seek(&*self.host, position_ms)
    }

    pub fn now_playing(&self, limit: usize) -> Result<Vec<TrackInfo>, AutomationError> {
        player::now_playing(&*self.host, limit)
    }

    pub fn run_js(&self, code: &str, expect_callback: bool) -> Result<String, AutomationError> {
        script::run_js(&*self.host, code, expect_callback)
    }
}
