//! Error types for the playback controller and its adapters.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a single uploaded file was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unsupported format '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("File too large ({size} bytes, maximum {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid audio MIME type '{mime}'")]
    InvalidMimeType { mime: String },
}

/// A validation failure tied to the file it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file_name}: {reason}")]
pub struct FileError {
    pub file_name: String,
    pub reason: ValidationError,
}

/// Every per-file failure of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Upload rejected: {} invalid file(s)", errors.len())]
pub struct BatchRejected {
    pub errors: Vec<FileError>,
}

/// Synchronous failures returned from controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Rejected(#[from] BatchRejected),

    #[error("Track index {index} out of range (playlist has {len} tracks)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Track '{0}' not found")]
    TrackNotFound(String),
}

/// Failure reported by a playback resource when a command cannot be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("Audio runtime is not running")]
    Disconnected,

    #[error("Play rejected: {0}")]
    PlayRejected(String),

    #[error("Seek position out of range: {0}")]
    InvalidSeek(String),
}

/// Persistence failures. These never cross the controller boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt value for key '{0}'")]
    Corrupt(String),
}

/// Classification of a fault stored in the playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    LoadError,
    PlaybackError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::LoadError => write!(f, "load error"),
            ErrorKind::PlaybackError => write!(f, "playback error"),
        }
    }
}

/// Asynchronous playback failure, rendered by the UI from `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackFault {
    /// The source could not be fetched or decoded.
    #[error("Failed to load audio file: {0}")]
    Load(String),

    /// The host refused to start playback.
    #[error("Failed to play audio: {0}")]
    Playback(String),
}

impl PlaybackFault {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackFault::Load(_) => ErrorKind::LoadError,
            PlaybackFault::Playback(_) => ErrorKind::PlaybackError,
        }
    }
}
