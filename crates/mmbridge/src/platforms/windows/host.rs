use super::dispatch::{from_host_value, str_arg, to_dispatch, to_host_value, Dispatch};
use super::ensure_com_initialized;
use crate::host::{
    AutomationHost, IniAccessor, IniStore, MenuItems, MenuNode, MenuNodeRef, PersistOp, Player,
    PlayerCommand, PlayerFlag, SongData, SongField, SongList, TriggerMechanism,
};
use crate::platforms::{first_collection, ConnectOptions, CHILD_COLLECTIONS};
use crate::types::HostValue;
use crate::AutomationError;
use std::sync::Arc;
use tracing::{debug, info};
use windows::core::{HSTRING, PCWSTR, VARIANT};
use windows::Win32::System::Com::{CLSIDFromProgID, CoCreateInstance, IDispatch, CLSCTX_ALL};

fn expect_object(member: &str, object: Option<Dispatch>) -> Result<Dispatch, AutomationError> {
    object.ok_or_else(|| AutomationError::PlatformError(format!("{member} returned nothing")))
}

fn index_arg(index: usize) -> Result<VARIANT, AutomationError> {
    i32::try_from(index)
        .map(VARIANT::from)
        .map_err(|_| AutomationError::InvalidArgument(format!("index {index} is out of range")))
}

/// `SDBApplication`
#[derive(Debug)]
pub struct ComHost {
    app: Dispatch,
    prog_id: String,
}

impl ComHost {
    pub fn connect(options: &ConnectOptions) -> Result<Self, AutomationError> {
        ensure_com_initialized()?;

        let prog_id = HSTRING::from(options.prog_id.as_str());
        let app: IDispatch = unsafe {
            let clsid = CLSIDFromProgID(PCWSTR(prog_id.as_ptr())).map_err(|e| {
                AutomationError::Unavailable(format!(
                    "ProgID '{}' is not registered ({e}); verify that MediaMonkey 5/2024 is installed",
                    options.prog_id
                ))
            })?;
            CoCreateInstance(&clsid, None, CLSCTX_ALL).map_err(|e| {
                AutomationError::Unavailable(format!(
                    "Unable to create COM object '{}': {e}",
                    options.prog_id
                ))
            })?
        };
        let app = Dispatch::new(app);

        if options.keep_alive {
            if let Err(e) = app.put("ShutdownAfterDisconnect", VARIANT::from(false)) {
                debug!("ShutdownAfterDisconnect not exposed by current build: {}", e);
            }
        }

        info!("Connected to {}", options.prog_id);
        Ok(Self {
            app,
            prog_id: options.prog_id.clone(),
        })
    }

    pub fn prog_id(&self) -> &str {
        &self.prog_id
    }
}

impl AutomationHost for ComHost {
    fn menu_root(&self, scope: &str) -> Result<MenuNodeRef, AutomationError> {
        ensure_com_initialized()?;
        let ui = expect_object("UI", self.app.get_object("UI")?)?;
        match ui.get_object(scope) {
            Ok(Some(root)) => Ok(Arc::new(ComMenuNode(root))),
            Ok(None) | Err(AutomationError::UnsupportedOperation(_)) => {
                Err(AutomationError::ScopeNotFound(scope.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn ini_store(&self) -> Result<Arc<dyn IniStore>, AutomationError> {
        ensure_com_initialized()?;
        let ini = expect_object("IniFile", self.app.get_object("IniFile")?)?;
        Ok(Arc::new(ComIniStore(ini)))
    }

    fn player(&self) -> Result<Arc<dyn Player>, AutomationError> {
        ensure_com_initialized()?;
        let player = expect_object("Player", self.app.get_object("Player")?)?;
        Ok(Arc::new(ComPlayer(player)))
    }

    fn run_js_code(&self, code: &str, wait: bool) -> Result<String, AutomationError> {
        ensure_com_initialized()?;
        let reply = self
            .app
            .call("runJSCode", &[str_arg(code), VARIANT::from(wait)])?;
        Ok(to_host_value(&reply).to_text().unwrap_or_default())
    }
}

#[derive(Debug)]
struct ComMenuNode(Dispatch);

impl MenuNode for ComMenuNode {
    fn caption(&self) -> Result<Option<String>, AutomationError> {
        Ok(self.0.get_value("Caption")?.to_text())
    }

    fn enabled(&self) -> Result<Option<bool>, AutomationError> {
        match self.0.get_value("Enabled") {
            Ok(HostValue::Empty) | Err(AutomationError::UnsupportedOperation(_)) => Ok(None),
            Ok(value) => Ok(Some(value.truthy())),
            Err(e) => Err(e),
        }
    }

    fn children(&self) -> Result<Option<Arc<dyn MenuItems>>, AutomationError> {
        let items = first_collection(&CHILD_COLLECTIONS, |member| {
            if !self.0.has_member(member) {
                return Ok(None);
            }
            self.0.get_object(member)
        })?;
        Ok(items.map(|items| Arc::new(ComMenuItems(items)) as Arc<dyn MenuItems>))
    }

    fn trigger(&self, mechanism: TriggerMechanism) -> Result<(), AutomationError> {
        self.0.call(mechanism.member_name(), &[]).map(|_| ())
    }
}

#[derive(Debug)]
struct ComMenuItems(Dispatch);

impl MenuItems for ComMenuItems {
    fn count(&self) -> Result<usize, AutomationError> {
        let count = self.0.get_value("Count")?.to_i64().unwrap_or(0);
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn item(&self, index: usize) -> Result<MenuNodeRef, AutomationError> {
        let variant = self.0.get_indexed("Item", &[index_arg(index)?])?;
        let node = expect_object("Item", to_dispatch("Item", &variant)?)?;
        Ok(Arc::new(ComMenuNode(node)))
    }
}

/// `SDBIniFile`
#[derive(Debug)]
struct ComIniStore(Dispatch);

impl IniStore for ComIniStore {
    fn read(
        &self,
        accessor: IniAccessor,
        section: &str,
        key: &str,
    ) -> Result<HostValue, AutomationError> {
        let value = self
            .0
            .get_indexed(accessor.member_name(), &[str_arg(section), str_arg(key)])?;
        Ok(to_host_value(&value))
    }

    fn write(
        &self,
        accessor: IniAccessor,
        section: &str,
        key: &str,
        value: &HostValue,
        flags: Option<i32>,
    ) -> Result<(), AutomationError> {
        let mut args = vec![str_arg(section), str_arg(key)];
        if let Some(flags) = flags {
            args.push(VARIANT::from(flags));
        }
        self.0
            .put_indexed(accessor.member_name(), &args, from_host_value(value))
    }

    fn supports(&self, op: PersistOp) -> bool {
        self.0.has_member(op.member_name())
    }

    fn persist(&self, op: PersistOp) -> Result<(), AutomationError> {
        self.0.call(op.member_name(), &[]).map(|_| ())
    }
}

/// `SDBPlayer`
#[derive(Debug)]
struct ComPlayer(Dispatch);

impl ComPlayer {
    fn int(&self, member: &str) -> Result<i64, AutomationError> {
        self.0
            .get_value(member)?
            .to_i64()
            .ok_or_else(|| AutomationError::PlatformError(format!("{member} is not numeric")))
    }

    fn song_list(&self) -> Result<Option<Arc<dyn SongList>>, AutomationError> {
        Ok(self
            .0
            .get_object("CurrentSongList")?
            .map(|list| Arc::new(ComSongList(list)) as Arc<dyn SongList>))
    }
}

impl Player for ComPlayer {
    fn flag(&self, flag: PlayerFlag) -> Result<bool, AutomationError> {
        Ok(self.0.get_value(flag.member_name())?.truthy())
    }

    fn set_stop_after_current(&self, value: bool) -> Result<(), AutomationError> {
        self.0.put("StopAfterCurrent", VARIANT::from(value))
    }

    fn volume(&self) -> Result<i64, AutomationError> {
        self.int("Volume")
    }

    fn set_volume(&self, level: i64) -> Result<(), AutomationError> {
        self.0.put("Volume", from_host_value(&HostValue::Int(level)))
    }

    fn playback_time_ms(&self) -> Result<i64, AutomationError> {
        self.int("PlaybackTime")
    }

    fn set_playback_time_ms(&self, position_ms: i64) -> Result<(), AutomationError> {
        self.0
            .put("PlaybackTime", from_host_value(&HostValue::Int(position_ms)))
    }

    fn current_song_index(&self) -> Result<i64, AutomationError> {
        self.int("CurrentSongIndex")
    }

    fn current_song(&self) -> Result<Option<Arc<dyn SongData>>, AutomationError> {
        Ok(self
            .0
            .get_object("CurrentSong")?
            .map(|song| Arc::new(ComSong(song)) as Arc<dyn SongData>))
    }

    fn current_song_list(&self) -> Result<Option<Arc<dyn SongList>>, AutomationError> {
        self.song_list()
    }

    fn command(&self, command: PlayerCommand) -> Result<(), AutomationError> {
        self.0.call(command.member_name(), &[]).map(|_| ())
    }
}

/// `SDBSongList`
#[derive(Debug)]
struct ComSongList(Dispatch);

impl SongList for ComSongList {
    fn count(&self) -> Result<usize, AutomationError> {
        let count = self.0.get_value("Count")?.to_i64().unwrap_or(0);
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn item(&self, index: usize) -> Result<Arc<dyn SongData>, AutomationError> {
        let variant = self.0.get_indexed("Item", &[index_arg(index)?])?;
        let song = expect_object("Item", to_dispatch("Item", &variant)?)?;
        Ok(Arc::new(ComSong(song)))
    }
}

/// `SDBSongData`
#[derive(Debug)]
struct ComSong(Dispatch);

impl SongData for ComSong {
    fn field(&self, field: SongField) -> Result<HostValue, AutomationError> {
        self.0.get_value(field.member_name())
    }
}
