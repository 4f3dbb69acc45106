//! Playback state, transport control and the Now Playing queue

use crate::host::{AutomationHost, Player, PlayerCommand, PlayerFlag, SongData, SongField};
use crate::AutomationError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub const MIN_VOLUME: i64 = 0;
pub const MAX_VOLUME: i64 = 100;

/// Default and upper bound of a Now Playing listing.
pub const DEFAULT_NOW_PLAYING_LIMIT: usize = 25;
pub const MAX_NOW_PLAYING_LIMIT: usize = 100;

/// Subset of `SDBSongData` that is useful to tool callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<i64>,
    /// Song length reported by MediaMonkey, in milliseconds.
    pub duration_ms: Option<i64>,
    pub path: Option<String>,
    /// Star rating on MediaMonkey's 0-100 scale.
    pub rating: Option<i64>,
    pub song_id: Option<i64>,
}

/// Snapshot of `SDBPlayer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub shuffle: bool,
    pub repeat: bool,
    pub stop_after_current: bool,
    pub volume: i64,
    pub playback_time_ms: i64,
    pub track_length_ms: Option<i64>,
    pub current_index: Option<i64>,
    pub now_playing_size: Option<usize>,
    pub track: Option<TrackInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Play,
    Pause,
    Toggle,
    Stop,
    Next,
    Previous,
    StopAfterCurrent,
}

fn safe_str(song: &dyn SongData, field: SongField) -> Option<String> {
    let text = song.field(field).ok()?.to_text()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn safe_int(song: &dyn SongData, field: SongField) -> Option<i64> {
    song.field(field).ok()?.to_i64()
}

/// Decode a song; every field is read independently and may be missing.
pub fn song_to_track(song: &dyn SongData) -> TrackInfo {
    TrackInfo {
        title: safe_str(song, SongField::Title),
        artist: safe_str(song, SongField::ArtistName),
        album: safe_str(song, SongField::AlbumName),
        album_artist: safe_str(song, SongField::AlbumArtistName),
        genre: safe_str(song, SongField::Genre),
        year: safe_int(song, SongField::Year),
        track_number: safe_int(song, SongField::TrackOrder),
        duration_ms: safe_int(song, SongField::SongLength),
        path: safe_str(song, SongField::Path),
        rating: safe_int(song, SongField::Rating),
        song_id: safe_int(song, SongField::SongId),
    }
}

fn flag_or_false(player: &dyn Player, flag: PlayerFlag) -> bool {
    player.flag(flag).unwrap_or_else(|e| {
        debug!("{} unreadable: {}", flag.member_name(), e);
        false
    })
}

/// Read the player into a [`PlaybackState`]. Individual properties that
/// cannot be read fall back to their neutral value.
pub fn collect_playback_state(player: &dyn Player) -> PlaybackState {
    let song: Option<Arc<dyn SongData>> = player.current_song().unwrap_or_else(|e| {
        debug!("CurrentSong unreadable: {}", e);
        None
    });
    let track = song.as_deref().map(song_to_track);
    let track_length_ms = track.as_ref().map(|t| t.duration_ms.unwrap_or(0));

    let now_playing_size = match player.current_song_list() {
        Ok(Some(list)) => Some(list.count().unwrap_or(0)),
        Ok(None) => None,
        Err(e) => {
            debug!("CurrentSongList unreadable: {}", e);
            None
        }
    };

    PlaybackState {
        is_playing: flag_or_false(player, PlayerFlag::Playing),
        is_paused: flag_or_false(player, PlayerFlag::Paused),
        shuffle: flag_or_false(player, PlayerFlag::Shuffle),
        repeat: flag_or_false(player, PlayerFlag::Repeat),
        stop_after_current: flag_or_false(player, PlayerFlag::StopAfterCurrent),
        volume: player
            .volume()
            .unwrap_or(0)
            .clamp(MIN_VOLUME, MAX_VOLUME),
        playback_time_ms: player.playback_time_ms().unwrap_or(0).max(0),
        track_length_ms,
        current_index: Some(player.current_song_index().unwrap_or(-1)),
        now_playing_size,
        track,
    }
}

pub fn playback_state(host: &dyn AutomationHost) -> Result<PlaybackState, AutomationError> {
    let player = host.player()?;
    Ok(collect_playback_state(&*player))
}

/// Run `action` and return the state afterwards.
#[instrument(skip(host))]
pub fn control_playback(
    host: &dyn AutomationHost,
    action: PlaybackAction,
) -> Result<PlaybackState, AutomationError> {
    let player = host.player()?;
    match action {
        PlaybackAction::Play => player.command(PlayerCommand::Play)?,
        PlaybackAction::Pause => player.command(PlayerCommand::Pause)?,
        PlaybackAction::Toggle => {
            if flag_or_false(&*player, PlayerFlag::Playing) {
                player.command(PlayerCommand::Pause)?
            } else {
                player.command(PlayerCommand::Play)?
            }
        }
        PlaybackAction::Stop => player.command(PlayerCommand::Stop)?,
        PlaybackAction::Next => player.command(PlayerCommand::Next)?,
        PlaybackAction::Previous => player.command(PlayerCommand::Previous)?,
        PlaybackAction::StopAfterCurrent => {
            let current = flag_or_false(&*player, PlayerFlag::StopAfterCurrent);
            player.set_stop_after_current(!current)?
        }
    }
    Ok(collect_playback_state(&*player))
}

/// Set the master volume, clamped to 0-100.
pub fn set_volume(host: &dyn AutomationHost, level: i64) -> Result<PlaybackState, AutomationError> {
    let player = host.player()?;
    player.set_volume(level.clamp(MIN_VOLUME, MAX_VOLUME))?;
    Ok(collect_playback_state(&*player))
}

/// Jump to `position_ms` within the active track; negative positions seek to 0.
pub fn seek(host: &dyn AutomationHost, position_ms: i64) -> Result<PlaybackState, AutomationError> {
    let player = host.player()?;
    player.set_playback_time_ms(position_ms.max(0))?;
    Ok(collect_playback_state(&*player))
}

/// First `limit` entries of the Now Playing queue. Unreadable entries are
/// skipped, so the result can be shorter than `limit`.
pub fn now_playing(host: &dyn AutomationHost, limit: usize) -> Result<Vec<TrackInfo>, AutomationError> {
    let player = host.player()?;
    let Some(list) = player.current_song_list()? else {
        return Ok(Vec::new());
    };

    let count = list.count().unwrap_or(0);
    let safe_limit = limit.min(count);
    let mut tracks = Vec::with_capacity(safe_limit);
    for index in 0..safe_limit {
        match list.item(index) {
            Ok(song) => tracks.push(song_to_track(&*song)),
            Err(e) => warn!("Failed to read Now Playing index {}: {}", index, e),
        }
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::memory::{MemoryHost, MemorySong};
    use crate::types::HostValue;

    fn song(title: &str) -> MemorySong {
        MemorySong::new()
            .with(SongField::Title, title)
            .with(SongField::ArtistName, "Artist")
            .with(SongField::SongLength, 180_000)
    }

    #[test]
    fn blank_and_missing_fields_are_none() {
        let s = MemorySong::new()
            .with(SongField::Title, "  ")
            .with(SongField::Year, "n/a")
            .with(SongField::Rating, HostValue::Int(80));
        let t = song_to_track(&s);
        assert_eq!(t.title, None);
        assert_eq!(t.year, None);
        assert_eq!(t.rating, Some(80));
        assert_eq!(t.album, None);
    }

    #[test]
    fn state_reflects_current_song() {
        let host = MemoryHost::new();
        host.player_state().queue(vec![song("One"), song("Two")]).current(1);
        let state = playback_state(&host).unwrap();
        assert_eq!(state.track.unwrap().title.as_deref(), Some("Two"));
        assert_eq!(state.track_length_ms, Some(180_000));
        assert_eq!(state.current_index, Some(1));
        assert_eq!(state.now_playing_size, Some(2));
    }

    #[test]
    fn toggle_follows_playing_flag() {
        let host = MemoryHost::new();
        let state = control_playback(&host, PlaybackAction::Toggle).unwrap();
        assert!(state.is_playing);
        let state = control_playback(&host, PlaybackAction::Toggle).unwrap();
        assert!(!state.is_playing);
        assert!(state.is_paused);
    }

    #[test]
    fn stop_after_current_flips() {
        let host = MemoryHost::new();
        assert!(control_playback(&host, PlaybackAction::StopAfterCurrent).unwrap().stop_after_current);
        assert!(!control_playback(&host, PlaybackAction::StopAfterCurrent).unwrap().stop_after_current);
    }

    #[test]
    fn volume_and_seek_are_clamped() {
        let host = MemoryHost::new();
        assert_eq!(set_volume(&host, 250).unwrap().volume, 100);
        assert_eq!(set_volume(&host, -3).unwrap().volume, 0);
        assert_eq!(seek(&host, -10).unwrap().playback_time_ms, 0);
        assert_eq!(seek(&host, 42_000).unwrap().playback_time_ms, 42_000);
    }

    #[test]
    fn now_playing_skips_failing_entries_and_respects_limit() {
        let host = MemoryHost::new();
        host.player_state()
            .queue(vec![song("A"), song("B"), song("C"), song("D")])
            .failing_queue_index(1);
        let titles: Vec<_> = now_playing(&host, 3)
            .unwrap()
            .into_iter()
            .map(|t| t.title.unwrap())
            .collect();
        assert_eq!(titles, vec!["A", "C"]);
        assert_eq!(now_playing(&host, 50).unwrap().len(), 3);
    }

    #[test]
    fn empty_queue_lists_nothing() {
        let host = MemoryHost::new();
        host.player_state().without_queue();
        assert!(now_playing(&host, 10).unwrap().is_empty());
        assert_eq!(playback_state(&host).unwrap().now_playing_size, None);
    }
}
