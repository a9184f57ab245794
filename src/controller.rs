//! Controller: the playback and playlist state machine.
//!
//! Owns the playlist, the playback state, the resource registry and the
//! playback resource. UI code reads snapshots and calls the action methods;
//! nothing else mutates state. Every mutating action writes through to the
//! persistence adapter before returning.
//!
//! Resource and probe events arrive on the `EventQueue` and are applied by
//! `process_events` on the controller's own thread.

use crate::config::{BatchPolicy, PlayerConfig};
use crate::error::{ControllerError, ErrorKind, FileError, PlaybackFault};
use crate::events::{ControllerEvent, EventQueue, EventSender};
use crate::persistence::{KeyValueStore, PersistedState, PersistenceAdapter, TrackRecord};
use crate::playlist::Playlist;
use crate::probe::ProbeWorker;
use crate::registry::{MediaSource, ResourceHandle, ResourceRegistry};
use crate::resource::{Generation, PlaybackResource, ResourceEvent};
use crate::sequencing::{self, RepeatMode, Step};
use crate::track::{self, Track, UNKNOWN_ARTIST};
use crate::upload::{self, UploadFile};
use serde::Serialize;

// ── Playback state ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Idle,
    Loading,
    Paused,
    Playing,
    Error,
}

/// Transport and settings. The selection lives in `Playlist::current_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_loading: bool,
    pub current_time_secs: f64,
    pub duration_secs: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
    pub last_error: Option<PlaybackFault>,
}

impl PlaybackState {
    pub fn new(volume: f32) -> Self {
        PlaybackState {
            is_playing: false,
            is_loading: false,
            current_time_secs: 0.0,
            duration_secs: 0.0,
            volume,
            is_muted: false,
            is_shuffled: false,
            repeat_mode: RepeatMode::None,
            last_error: None,
        }
    }

    /// Back to idle transport, keeping volume, mute, shuffle and repeat.
    pub fn reset_transport(&mut self) {
        self.is_playing = false;
        self.is_loading = false;
        self.current_time_secs = 0.0;
        self.duration_secs = 0.0;
        self.last_error = None;
    }

    /// Volume actually sent to the resource.
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted { 0.0 } else { self.volume }
    }
}

// ── Response data types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct TrackData {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub artist: String,
    pub duration_secs: f64,
    pub duration_display: String,
    pub size_display: String,
    pub is_current: bool,
}

/// Read-only view for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub status: PlayerStatus,
    /// -1 when nothing is selected.
    pub current_index: i64,
    pub is_playing: bool,
    pub is_loading: bool,
    pub current_time_secs: f64,
    pub duration_secs: f64,
    pub volume: f32,
    pub is_muted: bool,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub tracks: Vec<TrackData>,
}

/// Result of an accepted upload batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Ids of the tracks that were appended, in order.
    pub added: Vec<String>,
    /// Files left out under `BatchPolicy::CommitValid`.
    pub rejected: Vec<FileError>,
}

/// The load the resource is currently working on.
#[derive(Debug, Clone)]
struct ActiveLoad {
    generation: Generation,
    track_id: String,
    /// Set once `Ended` was handled, so a duplicate cannot advance twice.
    finished: bool,
}

// ── Controller ──────────────────────────────────────────────────────────────

pub struct Controller {
    config: PlayerConfig,
    playlist: Playlist,
    state: PlaybackState,
    registry: ResourceRegistry,
    resource: Box<dyn PlaybackResource>,
    persistence: PersistenceAdapter,
    events: EventQueue,
    /// Spawned on the first upload that needs probing.
    probe: Option<ProbeWorker>,
    rng: fastrand::Rng,
    generation: Generation,
    active: Option<ActiveLoad>,
    storage_failures: usize,
}

impl Controller {
    /// Build a controller and hydrate it from `store`.
    pub fn new(
        config: PlayerConfig,
        resource: Box<dyn PlaybackResource>,
        store: Box<dyn KeyValueStore>,
        events: EventQueue,
    ) -> Self {
        let persistence = PersistenceAdapter::new(store, config.default_volume);
        let mut controller = Controller {
            state: PlaybackState::new(config.default_volume),
            config,
            playlist: Playlist::new(),
            registry: ResourceRegistry::new(),
            resource,
            persistence,
            events,
            probe: None,
            rng: fastrand::Rng::new(),
            generation: 0,
            active: None,
            storage_failures: 0,
        };
        controller.hydrate();
        controller
    }

    /// Replace the random source (shuffle and ids). Used for reproducible runs.
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    fn hydrate(&mut self) {
        let saved = self.persistence.load();
        let saved_len = saved.tracks.len();
        let mut index_map: Vec<Option<usize>> = Vec::with_capacity(saved_len);

        for record in saved.tracks {
            let Some(path) = record.source_path.clone() else {
                tracing::warn!(track_id = %record.id, "stored track has no source path, dropping");
                index_map.push(None);
                continue;
            };
            if self.playlist.position_of(&record.id).is_some() {
                tracing::warn!(track_id = %record.id, "duplicate stored track id, dropping");
                index_map.push(None);
                continue;
            }
            let source = self.registry.allocate(MediaSource::Path(path));
            index_map.push(Some(self.playlist.track_count()));
            self.playlist.tracks.push(track_from_record(record, source));
        }

        let current = usize::try_from(saved.current_index)
            .ok()
            .filter(|&i| i < saved_len)
            .and_then(|i| index_map[i]);

        self.state.volume = saved.volume;
        self.state.repeat_mode = saved.repeat_mode;
        self.state.is_shuffled = saved.is_shuffled;
        self.apply_volume();

        tracing::debug!(
            tracks = self.playlist.track_count(),
            current = ?current,
            "hydrated from storage"
        );

        if let Some(index) = current {
            self.playlist.current_index = Some(index);
            self.load_index(index);
        }
    }

    // ── Read-only surface ───────────────────────────────────────────────

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn current_index(&self) -> Option<usize> {
        self.playlist.current_index
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.playlist.current()
    }

    pub fn status(&self) -> PlayerStatus {
        if self.playlist.current_index.is_none() {
            PlayerStatus::Idle
        } else if self.state.last_error.is_some() {
            PlayerStatus::Error
        } else if self.state.is_loading {
            PlayerStatus::Loading
        } else if self.state.is_playing {
            PlayerStatus::Playing
        } else {
            PlayerStatus::Paused
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let current = self.playlist.current_index;
        PlayerSnapshot {
            status: self.status(),
            current_index: current.map_or(-1, |i| i as i64),
            is_playing: self.state.is_playing,
            is_loading: self.state.is_loading,
            current_time_secs: self.state.current_time_secs,
            duration_secs: self.state.duration_secs,
            volume: self.state.volume,
            is_muted: self.state.is_muted,
            is_shuffled: self.state.is_shuffled,
            repeat_mode: self.state.repeat_mode,
            last_error: self.state.last_error.as_ref().map(|e| e.to_string()),
            last_error_kind: self.state.last_error.as_ref().map(PlaybackFault::kind),
            tracks: self
                .playlist
                .tracks
                .iter()
                .enumerate()
                .map(|(i, t)| TrackData {
                    index: i,
                    id: t.id.clone(),
                    name: t.name.clone(),
                    artist: t.artist.clone(),
                    duration_secs: t.duration_secs,
                    duration_display: t.duration_display(),
                    size_display: t.size_display(),
                    is_current: current == Some(i),
                })
                .collect(),
        }
    }

    /// Number of persistence writes that failed this session.
    pub fn storage_failures(&self) -> usize {
        self.storage_failures
    }

    /// Sender for resource adapters and probes feeding this controller.
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    // ── Playlist operations ─────────────────────────────────────────────

    /// Validate and append an upload batch. If nothing was selected, the
    /// first new track becomes current without starting playback.
    pub fn add_tracks(&mut self, files: Vec<UploadFile>) -> Result<BatchOutcome, ControllerError> {
        let (accepted, rejected) = match self.config.batch_policy {
            BatchPolicy::AllOrNothing => {
                if let Err(rejected) = upload::validate_batch(&files, &self.config) {
                    tracing::warn!(invalid = rejected.errors.len(), "upload batch rejected");
                    return Err(rejected.into());
                }
                (files, Vec::new())
            }
            BatchPolicy::CommitValid => {
                let rejected = upload::batch_errors(&files, &self.config);
                let accepted = files
                    .into_iter()
                    .filter(|f| upload::validate(f, &self.config).is_ok())
                    .collect();
                (accepted, rejected)
            }
        };

        let mut new_tracks = Vec::with_capacity(accepted.len());
        for file in accepted {
            let probe_source = file.content.clone();
            let track = upload::create_track(file, &mut self.registry, &mut self.rng);
            if self.config.probe_metadata {
                self.queue_probe(track.id.clone(), probe_source);
            }
            new_tracks.push(track);
        }
        let added: Vec<String> = new_tracks.iter().map(|t| t.id.clone()).collect();
        let first_new = self.playlist.append(new_tracks);

        if !added.is_empty() && self.playlist.current_index.is_none() {
            self.playlist.current_index = Some(first_new);
            self.load_index(first_new);
        }

        tracing::info!(added = added.len(), rejected = rejected.len(), "tracks added");
        self.persist();
        Ok(BatchOutcome { added, rejected })
    }

    /// Remove a track by id and release its resource handle.
    pub fn remove_track(&mut self, id: &str) -> Result<Track, ControllerError> {
        let index = self
            .playlist
            .position_of(id)
            .ok_or_else(|| ControllerError::TrackNotFound(id.to_string()))?;
        let was_current = self.playlist.current_index == Some(index);
        let track = self.playlist.remove_track(index)?;
        self.registry.release(&track.source);

        if was_current {
            if let Err(e) = self.resource.stop() {
                tracing::warn!(error = %e, "resource stop failed");
            }
            self.active = None;
            self.state.reset_transport();
        }

        tracing::info!(track_id = %track.id, was_current, "track removed");
        self.persist();
        Ok(track)
    }

    /// Empty the playlist and return to idle. Settings are kept.
    pub fn clear_playlist(&mut self) {
        let removed = self.playlist.clear();
        self.registry.release_all();
        if let Err(e) = self.resource.stop() {
            tracing::warn!(error = %e, "resource stop failed");
        }
        self.active = None;
        self.state.reset_transport();
        tracing::info!(removed = removed.len(), "playlist cleared");
        self.persist();
    }

    // ── Transport ───────────────────────────────────────────────────────

    /// Select a track and start playing it.
    pub fn select_track(&mut self, index: usize) -> Result<(), ControllerError> {
        let len = self.playlist.track_count();
        if index >= len {
            return Err(ControllerError::IndexOutOfRange { index, len });
        }
        self.play_index(index);
        Ok(())
    }

    pub fn toggle_play_pause(&mut self) {
        let Some(index) = self.playlist.current_index else {
            return;
        };
        if self.state.is_playing {
            if let Err(e) = self.resource.pause() {
                tracing::warn!(error = %e, "resource pause failed");
            }
            self.state.is_playing = false;
            tracing::debug!("paused");
        } else if matches!(self.state.last_error, Some(PlaybackFault::Load(_))) {
            // The source never loaded; retry from scratch.
            self.play_index(index);
        } else {
            self.state.last_error = None;
            self.state.is_playing = true;
            self.start_playback();
            tracing::debug!(playing = self.state.is_playing, "resumed");
        }
    }

    pub fn next(&mut self) {
        let step = sequencing::next_index(
            self.playlist.current_index,
            self.playlist.track_count(),
            self.state.repeat_mode,
            self.state.is_shuffled,
            &mut self.rng,
        );
        match step {
            Step::Play(index) => self.play_index(index),
            Step::EndOfPlaylist => {
                if let Err(e) = self.resource.pause() {
                    tracing::warn!(error = %e, "resource pause failed");
                }
                self.state.is_playing = false;
                tracing::info!("reached end of playlist");
                self.persist();
            }
            Step::Stay => {}
        }
    }

    pub fn previous(&mut self) {
        let step = sequencing::previous_index(
            self.playlist.current_index,
            self.playlist.track_count(),
            self.state.repeat_mode,
            self.state.is_shuffled,
            &mut self.rng,
        );
        if let Step::Play(index) = step {
            self.play_index(index);
        }
    }

    /// Seek within the current track, clamped to `[0, duration]`.
    pub fn seek(&mut self, time_secs: f64) {
        if self.playlist.current_index.is_none() || !time_secs.is_finite() {
            return;
        }
        let target = time_secs.clamp(0.0, self.state.duration_secs.max(0.0));
        if let Err(e) = self.resource.seek(target) {
            tracing::warn!(error = %e, "resource seek failed");
        }
        self.state.current_time_secs = target;
    }

    // ── Settings ────────────────────────────────────────────────────────

    /// Set volume, clamped to [0, 1]. A positive volume unmutes.
    pub fn set_volume(&mut self, volume: f32) {
        if !volume.is_finite() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.state.volume = volume;
        if volume > 0.0 {
            self.state.is_muted = false;
        }
        self.apply_volume();
        self.persist();
    }

    pub fn toggle_mute(&mut self) {
        self.state.is_muted = !self.state.is_muted;
        self.apply_volume();
        self.persist();
    }

    pub fn toggle_shuffle(&mut self) {
        self.state.is_shuffled = !self.state.is_shuffled;
        tracing::debug!(shuffled = self.state.is_shuffled, "shuffle toggled");
        self.persist();
    }

    /// None -> All -> One -> None.
    pub fn cycle_repeat_mode(&mut self) -> RepeatMode {
        self.state.repeat_mode = self.state.repeat_mode.cycle();
        tracing::debug!(repeat = %self.state.repeat_mode, "repeat mode changed");
        self.persist();
        self.state.repeat_mode
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Apply every queued event. Returns how many were processed.
    pub fn process_events(&mut self) -> usize {
        let events = self.events.drain();
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Resource(event) => self.handle_resource_event(event),
            ControllerEvent::DurationProbed {
                track_id,
                duration_secs,
            } => self.apply_probed_duration(&track_id, duration_secs),
        }
    }

    fn handle_resource_event(&mut self, event: ResourceEvent) {
        if !self.is_current_generation(event.generation()) {
            tracing::debug!(?event, "dropping stale resource event");
            return;
        }
        match event {
            ResourceEvent::MetadataLoaded { duration_secs, .. } => {
                self.state.is_loading = false;
                let duration_secs = track::sanitize_duration(duration_secs);
                if duration_secs > 0.0 {
                    self.state.duration_secs = duration_secs;
                    let resolved = self
                        .playlist
                        .current_mut()
                        .is_some_and(|t| t.resolve_duration(duration_secs));
                    if resolved {
                        self.persist();
                    }
                }
            }
            ResourceEvent::TimeAdvanced { position_secs, .. } => {
                if position_secs.is_finite() {
                    self.state.current_time_secs = position_secs.max(0.0);
                }
            }
            ResourceEvent::Ended { .. } => {
                let Some(active) = self.active.as_mut() else {
                    return;
                };
                if active.finished {
                    return;
                }
                active.finished = true;
                self.state.is_playing = false;
                tracing::debug!("track ended");
                self.next();
            }
            ResourceEvent::Failed { message, .. } => {
                tracing::warn!(error = %message, "failed to load audio");
                self.state.last_error = Some(PlaybackFault::Load(message));
                self.state.is_playing = false;
                self.state.is_loading = false;
            }
            ResourceEvent::PlayRejected { message, .. } => {
                tracing::warn!(error = %message, "playback rejected");
                self.state.last_error = Some(PlaybackFault::Playback(message));
                self.state.is_playing = false;
            }
        }
    }

    fn apply_probed_duration(&mut self, track_id: &str, duration_secs: f64) {
        let is_current = self.playlist.current().is_some_and(|t| t.id == track_id);
        let Some(track) = self.playlist.find_mut(track_id) else {
            tracing::debug!(track_id, "probe result for removed track");
            return;
        };
        if !track.resolve_duration(duration_secs) {
            return;
        }
        if is_current && self.state.duration_secs <= 0.0 {
            self.state.duration_secs = duration_secs;
        }
        self.persist();
    }

    fn queue_probe(&mut self, track_id: String, source: MediaSource) {
        if self.probe.is_none() {
            match ProbeWorker::spawn(self.events.sender()) {
                Ok(worker) => self.probe = Some(worker),
                Err(e) => {
                    tracing::warn!(error = %e, "could not start duration probe");
                    return;
                }
            }
        }
        let queued = self
            .probe
            .as_ref()
            .is_some_and(|worker| worker.submit(track_id, source));
        if !queued {
            tracing::warn!("duration probe worker stopped");
            self.probe = None;
        }
    }

    /// True if `generation` belongs to the load of the current track.
    fn is_current_generation(&self, generation: Generation) -> bool {
        match (&self.active, self.playlist.current()) {
            (Some(active), Some(track)) => {
                active.generation == generation && active.track_id == track.id
            }
            _ => false,
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Make `index` current and start it. `index` must be in range.
    fn play_index(&mut self, index: usize) {
        self.playlist.current_index = Some(index);
        self.load_index(index);
        if self.state.last_error.is_none() {
            self.state.is_playing = true;
            self.start_playback();
        }
        if let Some(track) = self.playlist.current() {
            tracing::info!(index, track_id = %track.id, name = %track.name, "playing");
        }
        self.persist();
    }

    /// Hand the track at `index` to the resource under a fresh generation.
    /// Leaves playback paused.
    fn load_index(&mut self, index: usize) {
        let Some(track) = self.playlist.tracks.get(index) else {
            return;
        };
        self.generation += 1;
        self.active = Some(ActiveLoad {
            generation: self.generation,
            track_id: track.id.clone(),
            finished: false,
        });
        self.state.reset_transport();
        self.state.duration_secs = track.duration_secs;

        let result = match self.registry.resolve(&track.source) {
            Some(source) => self
                .resource
                .load(source, self.generation)
                .map_err(|e| e.to_string()),
            None => Err(format!("No source for handle '{}'", track.source)),
        };
        match result {
            Ok(()) => self.state.is_loading = true,
            Err(message) => {
                tracing::warn!(error = %message, "failed to load audio");
                self.state.last_error = Some(PlaybackFault::Load(message));
            }
        }
    }

    fn start_playback(&mut self) {
        if let Some(active) = self.active.as_mut() {
            active.finished = false;
        }
        if let Err(e) = self.resource.play() {
            tracing::warn!(error = %e, "play rejected");
            self.state.last_error = Some(PlaybackFault::Playback(e.to_string()));
            self.state.is_playing = false;
        }
    }

    fn apply_volume(&mut self) {
        if let Err(e) = self.resource.set_volume(self.state.effective_volume()) {
            tracing::warn!(error = %e, "resource volume failed");
        }
    }

    fn persist(&mut self) {
        let state = PersistedState {
            tracks: self.playlist.tracks.iter().map(TrackRecord::from).collect(),
            current_index: self.playlist.current_index.map_or(-1, |i| i as i64),
            volume: self.state.volume,
            repeat_mode: self.state.repeat_mode,
            is_shuffled: self.state.is_shuffled,
        };
        if !self.persistence.save(&state) {
            self.storage_failures += 1;
        }
    }
}

fn track_from_record(record: TrackRecord, source: ResourceHandle) -> Track {
    Track {
        id: record.id,
        name: record.name,
        source,
        duration_secs: track::sanitize_duration(record.duration_secs),
        artist: if record.artist.is_empty() {
            UNKNOWN_ARTIST.to_string()
        } else {
            record.artist
        },
        size_bytes: record.size_bytes,
        mime_type: record.mime_type,
        source_path: record.source_path,
        added_at: record.added_at,
    }
}
