use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_VOLUME: f32 = 0.8;
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "ogg", "m4a", "aac"];

const STATE_DIR: &str = "playdeck";
const STATE_FILE: &str = "playdeck_state.json";

/// How an upload batch with some invalid files is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Any invalid file rejects the whole batch; nothing is added.
    #[default]
    AllOrNothing,
    /// Valid files are added, invalid ones are reported.
    CommitValid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_upload_bytes: u64,
    /// Lowercase extensions without the leading dot.
    pub accepted_extensions: Vec<String>,
    /// Volume used when the store holds none.
    pub default_volume: f32,
    pub batch_policy: BatchPolicy,
    /// Probe new tracks for their duration on a worker thread.
    pub probe_metadata: bool,
    /// State file for `JsonFileStore`. None = platform data dir.
    pub state_path: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            accepted_extensions: ACCEPTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            default_volume: DEFAULT_VOLUME,
            batch_policy: BatchPolicy::AllOrNothing,
            probe_metadata: true,
            state_path: None,
        }
    }
}

impl PlayerConfig {
    /// Load a config from JSON, falling back to defaults if missing or corrupt.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<PlayerConfig>(&data) {
                    Ok(config) => return config.sanitized(),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "corrupt config file, using defaults"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not read config file"),
            }
        }
        PlayerConfig::default()
    }

    /// Resolved location of the state file.
    pub fn state_file(&self) -> PathBuf {
        if let Some(path) = &self.state_path {
            return path.clone();
        }
        match dirs::data_local_dir() {
            Some(dir) => dir.join(STATE_DIR).join(STATE_FILE),
            None => PathBuf::from(STATE_FILE),
        }
    }

    /// True if `extension` (any case, no dot) is accepted.
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.accepted_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(extension))
    }

    fn sanitized(mut self) -> Self {
        if !self.default_volume.is_finite() {
            self.default_volume = DEFAULT_VOLUME;
        }
        self.default_volume = self.default_volume.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_upload_rules() {
        let config = PlayerConfig::default();
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.default_volume, 0.8);
        assert_eq!(config.batch_policy, BatchPolicy::AllOrNothing);
        assert!(config.accepts_extension("MP3"));
        assert!(config.accepts_extension("m4a"));
        assert!(!config.accepts_extension("flac"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let json = r#"{"batch_policy":"commit_valid"}"#;
        let config: PlayerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.batch_policy, BatchPolicy::CommitValid);
        assert_eq!(config.max_upload_bytes, MAX_UPLOAD_BYTES);
        assert!(config.probe_metadata);
    }

    #[test]
    fn load_from_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let config = PlayerConfig::load_from(&path);
        assert_eq!(config.default_volume, DEFAULT_VOLUME);
    }

    #[test]
    fn load_from_clamps_default_volume() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"default_volume": 3.0}"#).unwrap();
        let config = PlayerConfig::load_from(&path);
        assert_eq!(config.default_volume, 1.0);
    }

    #[test]
    fn explicit_state_path_wins() {
        let config = PlayerConfig {
            state_path: Some(PathBuf::from("/tmp/state.json")),
            ..Default::default()
        };
        assert_eq!(config.state_file(), PathBuf::from("/tmp/state.json"));
    }
}
