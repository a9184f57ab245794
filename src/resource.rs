//! The playback capability the controller drives.
//!
//! A resource plays one source at a time. It reports progress asynchronously
//! by posting `ResourceEvent`s (see `events::EventSender`); every event carries
//! the generation of the `load` it belongs to so the controller can drop
//! events from a track it already switched away from.

use crate::error::ResourceError;
use crate::registry::MediaSource;

/// Bumped by the controller on every load.
pub type Generation = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    MetadataLoaded { generation: Generation, duration_secs: f64 },
    TimeAdvanced { generation: Generation, position_secs: f64 },
    Ended { generation: Generation },
    /// The source could not be fetched or decoded.
    Failed { generation: Generation, message: String },
    /// The host refused to start playback.
    PlayRejected { generation: Generation, message: String },
}

impl ResourceEvent {
    pub fn generation(&self) -> Generation {
        match self {
            ResourceEvent::MetadataLoaded { generation, .. }
            | ResourceEvent::TimeAdvanced { generation, .. }
            | ResourceEvent::Ended { generation }
            | ResourceEvent::Failed { generation, .. }
            | ResourceEvent::PlayRejected { generation, .. } => *generation,
        }
    }
}

pub trait PlaybackResource: Send {
    /// Replace the current source. Playback stays paused until `play`.
    fn load(&mut self, source: &MediaSource, generation: Generation) -> Result<(), ResourceError>;

    fn play(&mut self) -> Result<(), ResourceError>;

    fn pause(&mut self) -> Result<(), ResourceError>;

    fn seek(&mut self, position_secs: f64) -> Result<(), ResourceError>;

    /// Effective output volume in [0, 1]; mute is applied by the caller.
    fn set_volume(&mut self, volume: f32) -> Result<(), ResourceError>;

    /// Drop the current source entirely.
    fn stop(&mut self) -> Result<(), ResourceError>;
}
