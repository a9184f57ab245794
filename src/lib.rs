//! playdeck: core library for a local audio playlist player.
//!
//! The `Controller` owns playback and playlist state; uploads, sequencing,
//! persistence and the rodio-backed audio runtime plug into it.
//! A GUI or any other host consumes this crate.

pub mod audio_runtime;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod persistence;
pub mod player;
pub mod playlist;
pub mod probe;
pub mod registry;
pub mod resource;
pub mod sequencing;
pub mod track;
pub mod upload;

pub use config::{BatchPolicy, PlayerConfig};
pub use controller::{BatchOutcome, Controller, PlaybackState, PlayerSnapshot, PlayerStatus};
pub use error::{ControllerError, ErrorKind, PlaybackFault, ValidationError};
pub use events::EventQueue;
pub use sequencing::RepeatMode;
pub use upload::UploadFile;
