//! AudioRuntime: dedicated audio thread with channel-based command dispatch.
//!
//! Owns the `Player` on a single thread (rodio's output stream is not `Send`).
//! The controller talks to it through `RodioResource`, which implements
//! `PlaybackResource` by sending `AudioCmd`s. Track-end detection and
//! position reporting happen inside the thread loop via `recv_timeout`.

use crate::error::ResourceError;
use crate::events::EventSender;
use crate::player::Player;
use crate::registry::MediaSource;
use crate::resource::{Generation, PlaybackResource, ResourceEvent};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
/// rodio's try_seek flushes the buffer, making is_empty() transiently true.
const SEEK_COOLDOWN: Duration = Duration::from_millis(500);

// ── Commands ─────────────────────────────────────────────────────────────────

/// Commands sent to the audio thread.
pub enum AudioCmd {
    Load {
        source: MediaSource,
        generation: Generation,
    },
    Play,
    Pause,
    Seek(Duration),
    SetVolume(f32),
    Stop,
    Shutdown,
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Thread-safe handle for sending commands to the audio runtime.
#[derive(Clone)]
pub struct AudioHandle {
    tx: mpsc::Sender<AudioCmd>,
}

impl AudioHandle {
    fn send(&self, cmd: AudioCmd) -> Result<(), ResourceError> {
        self.tx.send(cmd).map_err(|_| ResourceError::Disconnected)
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(AudioCmd::Shutdown);
    }
}

/// `PlaybackResource` backed by the rodio audio thread.
pub struct RodioResource {
    handle: AudioHandle,
}

impl RodioResource {
    /// Spawn the audio thread, posting its events to `events`.
    pub fn spawn(events: EventSender) -> std::io::Result<Self> {
        let handle = spawn_audio_runtime(move |event| events.resource(event))?;
        Ok(RodioResource { handle })
    }
}

impl PlaybackResource for RodioResource {
    fn load(&mut self, source: &MediaSource, generation: Generation) -> Result<(), ResourceError> {
        self.handle.send(AudioCmd::Load {
            source: source.clone(),
            generation,
        })
    }

    fn play(&mut self) -> Result<(), ResourceError> {
        self.handle.send(AudioCmd::Play)
    }

    fn pause(&mut self) -> Result<(), ResourceError> {
        self.handle.send(AudioCmd::Pause)
    }

    fn seek(&mut self, position_secs: f64) -> Result<(), ResourceError> {
        let position = Duration::try_from_secs_f64(position_secs.max(0.0))
            .map_err(|e| ResourceError::InvalidSeek(format!("{position_secs}: {e}")))?;
        self.handle.send(AudioCmd::Seek(position))
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), ResourceError> {
        self.handle.send(AudioCmd::SetVolume(volume))
    }

    fn stop(&mut self) -> Result<(), ResourceError> {
        self.handle.send(AudioCmd::Stop)
    }
}

impl Drop for RodioResource {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

// ── Runtime ──────────────────────────────────────────────────────────────────

/// Spawn the audio runtime on a dedicated thread.
///
/// `on_event` is called from the audio thread whenever the loaded source
/// changes state. The player is created lazily on the first load.
pub fn spawn_audio_runtime<F>(on_event: F) -> std::io::Result<AudioHandle>
where
    F: Fn(ResourceEvent) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<AudioCmd>();

    std::thread::Builder::new()
        .name("audio-runtime".into())
        .spawn(move || {
            let mut runtime = Runtime::new(on_event);
            runtime.run(rx);
        })?;

    Ok(AudioHandle { tx })
}

/// Thread-local state of the audio loop.
struct Runtime<F> {
    on_event: F,
    player: Option<Player>,
    volume: f32,
    /// Source and generation of the last successful load.
    loaded: Option<(MediaSource, Generation)>,
    was_playing: bool,
    last_seek: Option<Instant>,
    last_time_update: Instant,
}

impl<F> Runtime<F>
where
    F: Fn(ResourceEvent),
{
    fn new(on_event: F) -> Self {
        Runtime {
            on_event,
            player: None,
            volume: 1.0,
            loaded: None,
            was_playing: false,
            last_seek: None,
            last_time_update: Instant::now(),
        }
    }

    fn run(&mut self, rx: mpsc::Receiver<AudioCmd>) {
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(AudioCmd::Shutdown) => {
                    if let Some(p) = &self.player {
                        p.stop();
                    }
                    break;
                }
                Ok(cmd) => self.handle(cmd),
                Err(mpsc::RecvTimeoutError::Timeout) => self.tick(),
                // All senders dropped, shut down
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn handle(&mut self, cmd: AudioCmd) {
        match cmd {
            AudioCmd::Load { source, generation } => self.load(source, generation),

            AudioCmd::Play => self.play(),

            AudioCmd::Pause => {
                if let Some(p) = &self.player {
                    p.pause();
                }
                self.was_playing = false;
            }

            AudioCmd::Seek(position) => {
                if let Some(p) = &self.player {
                    match p.try_seek(position) {
                        Ok(()) => {
                            self.last_seek = Some(Instant::now());
                            self.report_time(p.position());
                        }
                        Err(e) => tracing::warn!(error = %e, "seek failed"),
                    }
                }
            }

            AudioCmd::SetVolume(volume) => {
                self.volume = volume;
                if let Some(p) = &self.player {
                    p.set_volume(volume);
                }
            }

            AudioCmd::Stop => {
                if let Some(p) = &self.player {
                    p.stop();
                }
                self.loaded = None;
                self.was_playing = false;
            }

            AudioCmd::Shutdown => {}
        }
    }

    fn ensure_player(&mut self) -> Result<&Player, String> {
        if self.player.is_none() {
            let p = Player::new()?;
            p.set_volume(self.volume);
            self.player = Some(p);
        }
        self.player
            .as_ref()
            .ok_or_else(|| "Audio output unavailable".to_string())
    }

    fn load(&mut self, source: MediaSource, generation: Generation) {
        self.was_playing = false;
        self.loaded = None;
        let result = self.ensure_player().and_then(|p| p.load(&source));
        match result {
            Ok(duration) => {
                self.loaded = Some((source, generation));
                (self.on_event)(ResourceEvent::MetadataLoaded {
                    generation,
                    duration_secs: duration.map(|d| d.as_secs_f64()).unwrap_or(0.0),
                });
            }
            Err(message) => (self.on_event)(ResourceEvent::Failed {
                generation,
                message,
            }),
        }
    }

    fn play(&mut self) {
        let Some((source, generation)) = self.loaded.clone() else {
            tracing::debug!("play requested with nothing loaded");
            return;
        };
        let player = match self.ensure_player() {
            Ok(p) => p,
            Err(message) => {
                (self.on_event)(ResourceEvent::PlayRejected {
                    generation,
                    message,
                });
                return;
            }
        };
        // A finished source is reloaded so play restarts it from the top.
        if player.is_empty() {
            if let Err(message) = player.load(&source) {
                (self.on_event)(ResourceEvent::PlayRejected {
                    generation,
                    message,
                });
                return;
            }
        }
        player.play();
        self.was_playing = true;
        self.last_time_update = Instant::now();
    }

    fn tick(&mut self) {
        if !self.was_playing {
            return;
        }
        let seek_cooldown = self
            .last_seek
            .map(|t| t.elapsed() < SEEK_COOLDOWN)
            .unwrap_or(false);
        let Some(p) = &self.player else {
            return;
        };
        if p.is_empty() && !seek_cooldown {
            self.was_playing = false;
            if let Some((_, generation)) = &self.loaded {
                (self.on_event)(ResourceEvent::Ended {
                    generation: *generation,
                });
            }
        } else if self.last_time_update.elapsed() >= TIME_UPDATE_INTERVAL {
            self.last_time_update = Instant::now();
            let position = p.position();
            self.report_time(position);
        }
    }

    fn report_time(&self, position: Duration) {
        if let Some((_, generation)) = &self.loaded {
            (self.on_event)(ResourceEvent::TimeAdvanced {
                generation: *generation,
                position_secs: position.as_secs_f64(),
            });
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AudioHandle>();
    }

    #[test]
    fn shutdown_stops_thread() {
        let handle = spawn_audio_runtime(|_| {}).unwrap();
        handle.shutdown();
        std::thread::sleep(Duration::from_millis(100));
        assert!(handle.send(AudioCmd::Play).is_err());
    }

    #[test]
    fn load_nonexistent_emits_failure() {
        let events: Arc<Mutex<Vec<ResourceEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let handle = spawn_audio_runtime(move |evt| {
            events_clone.lock().unwrap().push(evt);
        })
        .unwrap();

        handle
            .send(AudioCmd::Load {
                source: MediaSource::Path("__nonexistent_file__.mp3".into()),
                generation: 7,
            })
            .unwrap();

        std::thread::sleep(Duration::from_millis(500));

        let evts = events.lock().unwrap();
        // Either the file is missing or there is no audio device; both fail the load.
        assert!(
            evts.iter()
                .any(|e| matches!(e, ResourceEvent::Failed { generation: 7, .. })),
            "Expected Failed event, got: {:?}",
            *evts
        );

        handle.shutdown();
    }

    #[test]
    fn oversized_seek_is_an_error() {
        let queue = crate::events::EventQueue::new();
        let mut resource = RodioResource::spawn(queue.sender()).unwrap();
        assert!(matches!(
            resource.seek(1e200),
            Err(ResourceError::InvalidSeek(_))
        ));
        assert!(resource.seek(12.5).is_ok());
    }

    #[test]
    fn play_without_load_is_silent() {
        let events: Arc<Mutex<Vec<ResourceEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let handle = spawn_audio_runtime(move |evt| {
            events_clone.lock().unwrap().push(evt);
        })
        .unwrap();

        handle.send(AudioCmd::Play).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(events.lock().unwrap().is_empty());

        handle.shutdown();
    }
}
