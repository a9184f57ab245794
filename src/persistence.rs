//! Persistence adapter: key/value storage of the playlist and settings.
//!
//! Values are JSON text. Every key is read independently, so one corrupt key
//! falls back to its own default without discarding the others. Failures
//! never propagate past `PersistenceAdapter`; they are logged and reported
//! as `false`. One `save` is one `set_many` call, which `JsonFileStore`
//! turns into a single atomic file replace.

use crate::error::StorageError;
use crate::sequencing::RepeatMode;
use crate::track::Track;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

pub const KEY_PLAYLIST: &str = "playlist";
pub const KEY_CURRENT_INDEX: &str = "currentTrackIndex";
pub const KEY_VOLUME: &str = "volume";
pub const KEY_REPEAT_MODE: &str = "repeatMode";
pub const KEY_SHUFFLED: &str = "isShuffled";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;

    /// Write several keys as one unit.
    fn set_many(&mut self, entries: Vec<(&str, String)>) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// In-memory store. `failing()` builds one that rejects every write.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MemoryStore {
            values: HashMap::new(),
            fail_writes: true,
        }
    }

    pub fn with_value(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::other("store is read-only")));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// All keys in one pretty-printed JSON object file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open a state file. A missing file is an empty store; a corrupt one is
    /// logged and treated as empty.
    pub fn open(path: &Path) -> Self {
        let mut values = BTreeMap::new();
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str(&data) {
                    Ok(v) => values = v,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "corrupt state file, starting fresh"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not read state file"),
            }
        }
        JsonFileStore {
            path: path.to_path_buf(),
            values,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write to a sibling temp file, then rename over the state file so a
    /// reader never sees a half-written file.
    fn flush(&self) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn set_many(&mut self, entries: Vec<(&str, String)>) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.values.insert(key.to_string(), value);
        }
        self.flush()
    }
}

/// A track as stored at rest: everything except the live resource handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl From<&Track> for TrackRecord {
    fn from(t: &Track) -> Self {
        TrackRecord {
            id: t.id.clone(),
            name: t.name.clone(),
            artist: t.artist.clone(),
            duration_secs: t.duration_secs,
            size_bytes: t.size_bytes,
            mime_type: t.mime_type.clone(),
            source_path: t.source_path.clone(),
            added_at: t.added_at,
        }
    }
}

/// Playlist plus settings, persisted as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub tracks: Vec<TrackRecord>,
    /// -1 when nothing is selected.
    pub current_index: i64,
    pub volume: f32,
    pub repeat_mode: RepeatMode,
    pub is_shuffled: bool,
}

impl PersistedState {
    pub fn defaults(volume: f32) -> Self {
        PersistedState {
            tracks: Vec::new(),
            current_index: -1,
            volume,
            repeat_mode: RepeatMode::None,
            is_shuffled: false,
        }
    }
}

pub struct PersistenceAdapter {
    store: Box<dyn KeyValueStore>,
    default_volume: f32,
}

impl PersistenceAdapter {
    pub fn new(store: Box<dyn KeyValueStore>, default_volume: f32) -> Self {
        PersistenceAdapter {
            store,
            default_volume,
        }
    }

    /// Read every key, substituting its default when missing or corrupt.
    pub fn load(&self) -> PersistedState {
        let defaults = PersistedState::defaults(self.default_volume);
        let volume: f32 = self.load_key(KEY_VOLUME).unwrap_or(defaults.volume);
        PersistedState {
            tracks: self.load_key(KEY_PLAYLIST).unwrap_or(defaults.tracks),
            current_index: self
                .load_key(KEY_CURRENT_INDEX)
                .unwrap_or(defaults.current_index),
            volume: if volume.is_finite() {
                volume.clamp(0.0, 1.0)
            } else {
                defaults.volume
            },
            repeat_mode: self
                .load_key(KEY_REPEAT_MODE)
                .unwrap_or(defaults.repeat_mode),
            is_shuffled: self.load_key(KEY_SHUFFLED).unwrap_or(defaults.is_shuffled),
        }
    }

    /// Write every key in one batch. Returns false if the write failed.
    pub fn save(&mut self, state: &PersistedState) -> bool {
        let result = encode(state).and_then(|entries| self.store.set_many(entries));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "error saving to storage");
                false
            }
        }
    }

    fn load_key<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "error loading from storage");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, error = %StorageError::Corrupt(key.to_string()), "using default");
                None
            }
        }
    }

}

fn encode(state: &PersistedState) -> Result<Vec<(&'static str, String)>, StorageError> {
    Ok(vec![
        (KEY_PLAYLIST, serde_json::to_string(&state.tracks)?),
        (KEY_CURRENT_INDEX, serde_json::to_string(&state.current_index)?),
        (KEY_VOLUME, serde_json::to_string(&state.volume)?),
        (KEY_REPEAT_MODE, serde_json::to_string(&state.repeat_mode)?),
        (KEY_SHUFFLED, serde_json::to_string(&state.is_shuffled)?),
    ])
}
