//! Capability interface over MediaMonkey's automation surface.
//!
//! The live menu tree, the INI store and the player belong to the running
//! MediaMonkey process. Nothing here owns them: every call is a fresh read
//! or write through one of these traits, and any of them may fail or return
//! something different from the previous call. Platform hosts (COM on
//! Windows, in-memory for tests) implement these traits; everything above
//! them is written against the traits only.

use crate::types::HostValue;
use crate::AutomationError;
use std::fmt::Debug;
use std::sync::Arc;

/// Shared handle to a node of the external menu/toolbar graph.
pub type MenuNodeRef = Arc<dyn MenuNode>;

/// One menu or toolbar item.
pub trait MenuNode: Send + Sync + Debug {
    /// Raw caption, decorations included (`&File...`).
    fn caption(&self) -> Result<Option<String>, AutomationError>;

    /// `Ok(None)` when the node does not expose an enabled state at all.
    fn enabled(&self) -> Result<Option<bool>, AutomationError>;

    /// `Ok(None)` when the node has no child collection.
    fn children(&self) -> Result<Option<Arc<dyn MenuItems>>, AutomationError>;

    /// Fire one trigger mechanism. Nodes that do not expose the mechanism
    /// return [`AutomationError::UnsupportedOperation`].
    fn trigger(&self, mechanism: TriggerMechanism) -> Result<(), AutomationError>;
}

/// Index-addressed child collection (`Count` + `Item(i)`).
pub trait MenuItems: Send + Sync + Debug {
    fn count(&self) -> Result<usize, AutomationError>;
    fn item(&self, index: usize) -> Result<MenuNodeRef, AutomationError>;
}

/// Ways of firing a menu item, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerMechanism {
    Execute,
    Click,
    DoClick,
    OnClick,
}

impl TriggerMechanism {
    pub const PRIORITY: [TriggerMechanism; 4] = [
        TriggerMechanism::Execute,
        TriggerMechanism::Click,
        TriggerMechanism::DoClick,
        TriggerMechanism::OnClick,
    ];

    pub fn member_name(self) -> &'static str {
        match self {
            TriggerMechanism::Execute => "Execute",
            TriggerMechanism::Click => "Click",
            TriggerMechanism::DoClick => "DoClick",
            TriggerMechanism::OnClick => "OnClick",
        }
    }
}

/// Typed entry point of the INI store (`SDB.IniFile.StringValue` etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IniAccessor {
    StringValue,
    IntValue,
    BoolValue,
}

impl IniAccessor {
    pub fn member_name(self) -> &'static str {
        match self {
            IniAccessor::StringValue => "StringValue",
            IniAccessor::IntValue => "IntValue",
            IniAccessor::BoolValue => "BoolValue",
        }
    }
}

/// Optional persistence operations of the INI store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistOp {
    Apply,
    Flush,
}

impl PersistOp {
    pub fn member_name(self) -> &'static str {
        match self {
            PersistOp::Apply => "Apply",
            PersistOp::Flush => "Flush",
        }
    }
}

/// MediaMonkey's INI configuration store, addressed by (section, key).
pub trait IniStore: Send + Sync + Debug {
    fn read(
        &self,
        accessor: IniAccessor,
        section: &str,
        key: &str,
    ) -> Result<HostValue, AutomationError>;

    /// `flags` is the trailing argument some builds require and others
    /// reject; a rejected arity surfaces as
    /// [`AutomationError::SignatureMismatch`].
    fn write(
        &self,
        accessor: IniAccessor,
        section: &str,
        key: &str,
        value: &HostValue,
        flags: Option<i32>,
    ) -> Result<(), AutomationError>;

    fn supports(&self, op: PersistOp) -> bool;

    fn persist(&self, op: PersistOp) -> Result<(), AutomationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerFlag {
    Playing,
    Paused,
    Shuffle,
    Repeat,
    StopAfterCurrent,
}

impl PlayerFlag {
    pub fn member_name(self) -> &'static str {
        match self {
            PlayerFlag::Playing => "isPlaying",
            PlayerFlag::Paused => "isPaused",
            PlayerFlag::Shuffle => "isShuffle",
            PlayerFlag::Repeat => "isRepeat",
            PlayerFlag::StopAfterCurrent => "StopAfterCurrent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
}

impl PlayerCommand {
    pub fn member_name(self) -> &'static str {
        match self {
            PlayerCommand::Play => "Play",
            PlayerCommand::Pause => "Pause",
            PlayerCommand::Stop => "Stop",
            PlayerCommand::Next => "Next",
            PlayerCommand::Previous => "Previous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SongField {
    Title,
    ArtistName,
    AlbumName,
    AlbumArtistName,
    Genre,
    Year,
    TrackOrder,
    SongLength,
    Path,
    Rating,
    SongId,
}

impl SongField {
    pub fn member_name(self) -> &'static str {
        match self {
            SongField::Title => "Title",
            SongField::ArtistName => "ArtistName",
            SongField::AlbumName => "AlbumName",
            SongField::AlbumArtistName => "AlbumArtistName",
            SongField::Genre => "Genre",
            SongField::Year => "Year",
            SongField::TrackOrder => "TrackOrder",
            SongField::SongLength => "SongLength",
            SongField::Path => "Path",
            SongField::Rating => "Rating",
            SongField::SongId => "SongID",
        }
    }
}

/// `SDBSongData`
pub trait SongData: Send + Sync + Debug {
    fn field(&self, field: SongField) -> Result<HostValue, AutomationError>;
}

/// `SDBSongList`
pub trait SongList: Send + Sync + Debug {
    fn count(&self) -> Result<usize, AutomationError>;
    fn item(&self, index: usize) -> Result<Arc<dyn SongData>, AutomationError>;
}

/// `SDBPlayer`
pub trait Player: Send + Sync + Debug {
    fn flag(&self, flag: PlayerFlag) -> Result<bool, AutomationError>;
    fn set_stop_after_current(&self, value: bool) -> Result<(), AutomationError>;
    fn volume(&self) -> Result<i64, AutomationError>;
    fn set_volume(&self, level: i64) -> Result<(), AutomationError>;
    fn playback_time_ms(&self) -> Result<i64, AutomationError>;
    fn set_playback_time_ms(&self, position_ms: i64) -> Result<(), AutomationError>;
    fn current_song_index(&self) -> Result<i64, AutomationError>;
    fn current_song(&self) -> Result<Option<Arc<dyn SongData>>, AutomationError>;
    fn current_song_list(&self) -> Result<Option<Arc<dyn SongList>>, AutomationError>;
    fn command(&self, command: PlayerCommand) -> Result<(), AutomationError>;
}

/// Root of the automation surface (`SDBApplication`).
pub trait AutomationHost: Send + Sync + Debug {
    /// Root menu/toolbar collection named by `scope` (`SDB.UI.<scope>`).
    fn menu_root(&self, scope: &str) -> Result<MenuNodeRef, AutomationError>;

    fn ini_store(&self) -> Result<Arc<dyn IniStore>, AutomationError>;

    fn player(&self) -> Result<Arc<dyn Player>, AutomationError>;

    /// `SDBApplication.runJSCode(code, wait)`
    fn run_js_code(&self, code: &str, wait: bool) -> Result<String, AutomationError>;
}
