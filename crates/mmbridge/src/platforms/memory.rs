//! In-memory automation host.
//!
//! Mirrors the quirks of the live surface closely enough to drive the
//! engine without MediaMonkey: captionless separators, child collections
//! that are missing or whose `Count` overshoots, items that refuse some
//! trigger mechanisms, INI writes that insist on (or reject) the flags
//! argument, and a Now Playing queue with unreadable entries.

use crate::host::{
    AutomationHost, IniAccessor, IniStore, MenuItems, MenuNode, MenuNodeRef, PersistOp, Player,
    PlayerCommand, PlayerFlag, SongData, SongField, SongList, TriggerMechanism,
};
use crate::types::HostValue;
use crate::AutomationError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Menus
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryMenuNode {
    caption: Option<String>,
    enabled: Option<bool>,
    children: Vec<MenuNodeRef>,
    has_collection: bool,
    failing_indices: HashSet<usize>,
    reported_count: Option<usize>,
    exposed: Vec<TriggerMechanism>,
    failing: HashSet<TriggerMechanism>,
    fired: Mutex<Vec<TriggerMechanism>>,
}

impl MemoryMenuNode {
    pub fn new(caption: impl Into<String>) -> Self {
        Self::with_caption(Some(caption.into()))
    }

    /// A node without a caption, like the separators in MediaMonkey's menus.
    pub fn separator() -> Self {
        Self::with_caption(None)
    }

    fn with_caption(caption: Option<String>) -> Self {
        Self {
            caption,
            enabled: Some(true),
            children: Vec::new(),
            has_collection: true,
            failing_indices: HashSet::new(),
            reported_count: None,
            exposed: TriggerMechanism::PRIORITY.to_vec(),
            failing: HashSet::new(),
            fired: Mutex::new(Vec::new()),
        }
    }

    pub fn with_child(self, child: MemoryMenuNode) -> Self {
        self.with_child_ref(child.into_ref())
    }

    /// Attach an already shared child, so a test can keep a handle on it.
    pub fn with_child_ref(mut self, child: MenuNodeRef) -> Self {
        self.children.push(child);
        self
    }

    /// `Item(index)` fails for this child index.
    pub fn with_failing_index(mut self, index: usize) -> Self {
        self.failing_indices.insert(index);
        self
    }

    /// The node exposes neither `SubItems` nor `Items`.
    pub fn without_collection(mut self) -> Self {
        self.has_collection = false;
        self
    }

    /// `Count` reports `count` regardless of the real number of children.
    pub fn with_reported_count(mut self, count: usize) -> Self {
        self.reported_count = Some(count);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = Some(false);
        self
    }

    pub fn without_enabled_state(mut self) -> Self {
        self.enabled = None;
        self
    }

    /// Restrict the exposed trigger members to `mechanisms`.
    pub fn with_triggers(mut self, mechanisms: &[TriggerMechanism]) -> Self {
        self.exposed = mechanisms.to_vec();
        self
    }

    /// `mechanism` is exposed but raises when called.
    pub fn with_failing_trigger(mut self, mechanism: TriggerMechanism) -> Self {
        self.failing.insert(mechanism);
        self
    }

    pub fn into_ref(self) -> MenuNodeRef {
        Arc::new(self)
    }

    pub fn into_arc(self) -> Arc<MemoryMenuNode> {
        Arc::new(self)
    }

    /// Mechanisms that fired successfully, oldest first.
    pub fn fired(&self) -> Vec<TriggerMechanism> {
        lock(&self.fired).clone()
    }
}

impl MenuNode for MemoryMenuNode {
    fn caption(&self) -> Result<Option<String>, AutomationError> {
        Ok(self.caption.clone())
    }

    fn enabled(&self) -> Result<Option<bool>, AutomationError> {
        Ok(self.enabled)
    }

    fn children(&self) -> Result<Option<Arc<dyn MenuItems>>, AutomationError> {
        if !self.has_collection {
            return Ok(None);
        }
        let items: Arc<dyn MenuItems> = Arc::new(MemoryMenuItems {
            children: self.children.clone(),
            failing_indices: self.failing_indices.clone(),
            reported_count: self.reported_count,
        });
        Ok(Some(items))
    }

    fn trigger(&self, mechanism: TriggerMechanism) -> Result<(), AutomationError> {
        if !self.exposed.contains(&mechanism) {
            return Err(AutomationError::UnsupportedOperation(format!(
                "{} is not exposed",
                mechanism.member_name()
            )));
        }
        if self.failing.contains(&mechanism) {
            return Err(AutomationError::PlatformError(format!(
                "{} raised",
                mechanism.member_name()
            )));
        }
        lock(&self.fired).push(mechanism);
        Ok(())
    }
}

#[derive(Debug)]
struct MemoryMenuItems {
    children: Vec<MenuNodeRef>,
    failing_indices: HashSet<usize>,
    reported_count: Option<usize>,
}

impl MenuItems for MemoryMenuItems {
    fn count(&self) -> Result<usize, AutomationError> {
        Ok(self.reported_count.unwrap_or(self.children.len()))
    }

    fn item(&self, index: usize) -> Result<MenuNodeRef, AutomationError> {
        if self.failing_indices.contains(&index) {
            return Err(AutomationError::PlatformError(format!(
                "Item({index}) raised"
            )));
        }
        self.children.get(index).cloned().ok_or_else(|| {
            AutomationError::PlatformError(format!("Item({index}) is out of range"))
        })
    }
}

// ---------------------------------------------------------------------------
// INI store
// ---------------------------------------------------------------------------

/// Which forms of the write accessors the store accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteArity {
    #[default]
    Any,
    /// Only the four-argument form (with flags).
    RequiresFlags,
    /// Only the three-argument form.
    RejectsFlags,
}

/// A successful mutating call on [`MemoryIniStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum IniCall {
    Write {
        accessor: IniAccessor,
        section: String,
        key: String,
        value: HostValue,
        flags: Option<i32>,
    },
    Persist(PersistOp),
}

#[derive(Debug)]
pub struct MemoryIniStore {
    entries: Mutex<HashMap<(String, String), HostValue>>,
    calls: Mutex<Vec<IniCall>>,
    write_attempts: AtomicUsize,
    arity: WriteArity,
    failing_writes: bool,
    failing_reads: bool,
    ops: HashSet<PersistOp>,
}

impl Default for MemoryIniStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIniStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            write_attempts: AtomicUsize::new(0),
            arity: WriteArity::Any,
            failing_writes: false,
            failing_reads: false,
            ops: [PersistOp::Apply, PersistOp::Flush].into_iter().collect(),
        }
    }

    pub fn with_entry(self, section: &str, key: &str, value: impl Into<HostValue>) -> Self {
        lock(&self.entries).insert((section.to_string(), key.to_string()), value.into());
        self
    }

    pub fn with_write_arity(mut self, arity: WriteArity) -> Self {
        self.arity = arity;
        self
    }

    /// Every write raises a platform error.
    pub fn with_failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    /// Every read raises a platform error.
    pub fn with_failing_reads(mut self) -> Self {
        self.failing_reads = true;
        self
    }

    pub fn without_op(mut self, op: PersistOp) -> Self {
        self.ops.remove(&op);
        self
    }

    pub fn calls(&self) -> Vec<IniCall> {
        lock(&self.calls).clone()
    }

    /// Number of write calls made, successful or not.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Stored value, bypassing accessor semantics.
    pub fn raw(&self, section: &str, key: &str) -> Option<HostValue> {
        lock(&self.entries)
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }
}

impl IniStore for MemoryIniStore {
    fn read(
        &self,
        _accessor: IniAccessor,
        section: &str,
        key: &str,
    ) -> Result<HostValue, AutomationError> {
        if self.failing_reads {
            return Err(AutomationError::PlatformError(format!(
                "cannot read [{section}] {key}"
            )));
        }
        Ok(self.raw(section, key).unwrap_or_default())
    }

    fn write(
        &self,
        accessor: IniAccessor,
        section: &str,
        key: &str,
        value: &HostValue,
        flags: Option<i32>,
    ) -> Result<(), AutomationError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_writes {
            return Err(AutomationError::PlatformError(format!(
                "{} refused [{section}] {key}",
                accessor.member_name()
            )));
        }
        match (self.arity, flags) {
            (WriteArity::RequiresFlags, None) | (WriteArity::RejectsFlags, Some(_)) => {
                return Err(AutomationError::SignatureMismatch(format!(
                    "{}: invalid number of parameters",
                    accessor.member_name()
                )));
            }
            _ => {}
        }

        lock(&self.entries).insert((section.to_string(), key.to_string()), value.clone());
        lock(&self.calls).push(IniCall::Write {
            accessor,
            section: section.to_string(),
            key: key.to_string(),
            value: value.clone(),
            flags,
        });
        Ok(())
    }

    fn supports(&self, op: PersistOp) -> bool {
        self.ops.contains(&op)
    }

    fn persist(&self, op: PersistOp) -> Result<(), AutomationError> {
        if !self.supports(op) {
            return Err(AutomationError::UnsupportedOperation(format!(
                "{} is not exposed",
                op.member_name()
            )));
        }
        lock(&self.calls).push(IniCall::Persist(op));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Songs and player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemorySong {
    fields: HashMap<SongField, HostValue>,
    failing: HashSet<SongField>,
}

impl MemorySong {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: SongField, value: impl Into<HostValue>) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Reading `field` raises.
    pub fn with_failing_field(mut self, field: SongField) -> Self {
        self.failing.insert(field);
        self
    }
}

impl SongData for MemorySong {
    fn field(&self, field: SongField) -> Result<HostValue, AutomationError> {
        if self.failing.contains(&field) {
            return Err(AutomationError::PlatformError(format!(
                "{} raised",
                field.member_name()
            )));
        }
        Ok(self.fields.get(&field).cloned().unwrap_or_default())
    }
}

#[derive(Debug)]
struct MemorySongList {
    songs: Vec<Arc<MemorySong>>,
    failing_indices: HashSet<usize>,
}

impl SongList for MemorySongList {
    fn count(&self) -> Result<usize, AutomationError> {
        Ok(self.songs.len())
    }

    fn item(&self, index: usize) -> Result<Arc<dyn SongData>, AutomationError> {
        if self.failing_indices.contains(&index) {
            return Err(AutomationError::PlatformError(format!(
                "Item({index}) raised"
            )));
        }
        match self.songs.get(index) {
            Some(song) => Ok(song.clone() as Arc<dyn SongData>),
            None => Err(AutomationError::PlatformError(format!(
                "Item({index}) is out of range"
            ))),
        }
    }
}

#[derive(Debug)]
struct PlayerState {
    playing: bool,
    paused: bool,
    shuffle: bool,
    repeat: bool,
    stop_after_current: bool,
    volume: i64,
    position_ms: i64,
    current_index: i64,
    queue: Option<Vec<Arc<MemorySong>>>,
    failing_queue_indices: HashSet<usize>,
    commands: Vec<PlayerCommand>,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            playing: false,
            paused: false,
            shuffle: false,
            repeat: false,
            stop_after_current: false,
            volume: 50,
            position_ms: 0,
            current_index: -1,
            queue: Some(Vec::new()),
            failing_queue_indices: HashSet::new(),
            commands: Vec::new(),
        }
    }
}

/// Player fake. Setup methods take `&self` so a test can arrange state on
/// a player already owned by a [`MemoryHost`].
#[derive(Debug, Default)]
pub struct MemoryPlayer {
    state: Mutex<PlayerState>,
}

impl MemoryPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the Now Playing queue.
    pub fn queue(&self, songs: Vec<MemorySong>) -> &Self {
        lock(&self.state).queue = Some(songs.into_iter().map(Arc::new).collect());
        self
    }

    /// No Now Playing list at all.
    pub fn without_queue(&self) -> &Self {
        lock(&self.state).queue = None;
        self
    }

    pub fn failing_queue_index(&self, index: usize) -> &Self {
        lock(&self.state).failing_queue_indices.insert(index);
        self
    }

    pub fn current(&self, index: i64) -> &Self {
        lock(&self.state).current_index = index;
        self
    }

    pub fn playing(&self, playing: bool) -> &Self {
        let mut state = lock(&self.state);
        state.playing = playing;
        state.paused = false;
        self
    }

    pub fn commands(&self) -> Vec<PlayerCommand> {
        lock(&self.state).commands.clone()
    }
}

impl Player for MemoryPlayer {
    fn flag(&self, flag: PlayerFlag) -> Result<bool, AutomationError> {
        let state = lock(&self.state);
        Ok(match flag {
            PlayerFlag::Playing => state.playing,
            PlayerFlag::Paused => state.paused,
            PlayerFlag::Shuffle => state.shuffle,
            PlayerFlag::Repeat => state.repeat,
            PlayerFlag::StopAfterCurrent => state.stop_after_current,
        })
    }

    fn set_stop_after_current(&self, value: bool) -> Result<(), AutomationError> {
        lock(&self.state).stop_after_current = value;
        Ok(())
    }

    fn volume(&self) -> Result<i64, AutomationError> {
        Ok(lock(&self.state).volume)
    }

    fn set_volume(&self, level: i64) -> Result<(), AutomationError> {
        lock(&self.state).volume = level;
        Ok(())
    }

    fn playback_time_ms(&self) -> Result<i64, AutomationError> {
        Ok(lock(&self.state).position_ms)
    }

    fn set_playback_time_ms(&self, position_ms: i64) -> Result<(), AutomationError> {
        lock(&self.state).position_ms = position_ms;
        Ok(())
    }

    fn current_song_index(&self) -> Result<i64, AutomationError> {
        Ok(lock(&self.state).current_index)
    }

    fn current_song(&self) -> Result<Option<Arc<dyn SongData>>, AutomationError> {
        let state = lock(&self.state);
        let song = usize::try_from(state.current_index)
            .ok()
            .and_then(|index| state.queue.as_ref()?.get(index).cloned());
        Ok(song.map(|song| song as Arc<dyn SongData>))
    }

    fn current_song_list(&self) -> Result<Option<Arc<dyn SongList>>, AutomationError> {
        let state = lock(&self.state);
        Ok(state.queue.as_ref().map(|songs| {
            Arc::new(MemorySongList {
                songs: songs.clone(),
                failing_indices: state.failing_queue_indices.clone(),
            }) as Arc<dyn SongList>
        }))
    }

    fn command(&self, command: PlayerCommand) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.commands.push(command);
        let queue_len = state.queue.as_ref().map_or(0, Vec::len) as i64;
        match command {
            PlayerCommand::Play => {
                state.playing = true;
                state.paused = false;
            }
            PlayerCommand::Pause => {
                if state.playing {
                    state.playing = false;
                    state.paused = true;
                }
            }
            PlayerCommand::Stop => {
                state.playing = false;
                state.paused = false;
                state.position_ms = 0;
            }
            PlayerCommand::Next => {
                if state.current_index + 1 < queue_len {
                    state.current_index += 1;
                    state.position_ms = 0;
                }
            }
            PlayerCommand::Previous => {
                if state.current_index > 0 {
                    state.current_index -= 1;
                    state.position_ms = 0;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MemoryHost {
    scopes: Mutex<HashMap<String, MenuNodeRef>>,
    ini: Arc<MemoryIniStore>,
    player: Arc<MemoryPlayer>,
    js_replies: Mutex<VecDeque<Result<String, AutomationError>>>,
    scripts: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            scopes: Mutex::new(HashMap::new()),
            ini: Arc::new(MemoryIniStore::new()),
            player: Arc::new(MemoryPlayer::new()),
            js_replies: Mutex::new(VecDeque::new()),
            scripts: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Register `root` as `SDB.UI.<scope>`.
    pub fn with_scope(self, scope: &str, root: MemoryMenuNode) -> Self {
        self.with_scope_ref(scope, root.into_ref())
    }

    pub fn with_scope_ref(self, scope: &str, root: MenuNodeRef) -> Self {
        lock(&self.scopes).insert(scope.to_string(), root);
        self
    }

    pub fn with_ini(mut self, ini: MemoryIniStore) -> Self {
        self.ini = Arc::new(ini);
        self
    }

    pub fn ini(&self) -> Arc<MemoryIniStore> {
        self.ini.clone()
    }

    pub fn player_state(&self) -> &MemoryPlayer {
        &self.player
    }

    /// Queue the next reply of `runJSCode`. Without a queued reply the call
    /// returns an empty string.
    pub fn push_js_reply(&self, reply: Result<String, AutomationError>) {
        lock(&self.js_replies).push_back(reply);
    }

    /// Code passed to `runJSCode`, oldest first.
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.scripts).clone()
    }

    /// Simulate MediaMonkey going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), AutomationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(AutomationError::Unavailable(
                "RPC server is unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl AutomationHost for MemoryHost {
    fn menu_root(&self, scope: &str) -> Result<MenuNodeRef, AutomationError> {
        self.ensure_available()?;
        lock(&self.scopes)
            .get(scope)
            .cloned()
            .ok_or_else(|| AutomationError::ScopeNotFound(scope.to_string()))
    }

    fn ini_store(&self) -> Result<Arc<dyn IniStore>, AutomationError> {
        self.ensure_available()?;
        Ok(self.ini.clone() as Arc<dyn IniStore>)
    }

    fn player(&self) -> Result<Arc<dyn Player>, AutomationError> {
        self.ensure_available()?;
        Ok(self.player.clone() as Arc<dyn Player>)
    }

    fn run_js_code(&self, code: &str, _wait: bool) -> Result<String, AutomationError> {
        self.ensure_available()?;
        lock(&self.scripts).push(code.to_string());
        lock(&self.js_replies)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}
