//! Track factory: validates uploaded files and turns them into playlist tracks.

use crate::config::PlayerConfig;
use crate::error::{BatchRejected, FileError, ValidationError};
use crate::registry::{MediaSource, ResourceRegistry};
use crate::track::{generate_id, Track, UNKNOWN_ARTIST};
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A file handed to the player, either on disk or already in memory.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub content: MediaSource,
}

impl UploadFile {
    /// Describe an on-disk file. The MIME type is guessed from its extension.
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let meta = fs::metadata(path)
            .map_err(|e| format!("Invalid path '{}': {}", path.display(), e))?;
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| format!("Invalid path '{}': no file name", path.display()))?;
        let mime_type = guess_mime(extension_of(&name)).to_string();
        Ok(UploadFile {
            name,
            size_bytes: meta.len(),
            mime_type,
            content: MediaSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadFile {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            mime_type: mime_type.into(),
            content: MediaSource::Bytes(Arc::from(bytes)),
        }
    }

    pub fn extension(&self) -> &str {
        extension_of(&self.name)
    }
}

/// Text after the last '.', or "" when the name has none.
fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

pub fn guess_mime(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// File name without its final extension.
pub fn display_name(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Check one file. Format, then size, then MIME type.
pub fn validate(file: &UploadFile, config: &PlayerConfig) -> Result<(), ValidationError> {
    let extension = file.extension();
    if !config.accepts_extension(extension) {
        return Err(ValidationError::UnsupportedFormat {
            extension: extension.to_ascii_lowercase(),
        });
    }
    if file.size_bytes > config.max_upload_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size_bytes,
            max: config.max_upload_bytes,
        });
    }
    if !file.mime_type.starts_with("audio/") {
        return Err(ValidationError::InvalidMimeType {
            mime: file.mime_type.clone(),
        });
    }
    Ok(())
}

/// Per-file failures of a batch, in input order.
pub fn batch_errors(files: &[UploadFile], config: &PlayerConfig) -> Vec<FileError> {
    files
        .iter()
        .filter_map(|file| {
            validate(file, config).err().map(|reason| FileError {
                file_name: file.name.clone(),
                reason,
            })
        })
        .collect()
}

pub fn validate_batch(files: &[UploadFile], config: &PlayerConfig) -> Result<(), BatchRejected> {
    let errors = batch_errors(files, config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(BatchRejected { errors })
    }
}

/// Build a track from an already validated file and allocate its handle.
/// Duration starts unknown; see `probe`.
pub fn create_track(file: UploadFile, registry: &mut ResourceRegistry, rng: &mut fastrand::Rng) -> Track {
    let source_path = match &file.content {
        MediaSource::Path(p) => Some(p.clone()),
        MediaSource::Bytes(_) => None,
    };
    let source = registry.allocate(file.content);
    Track {
        id: generate_id(rng),
        name: display_name(&file.name),
        source,
        duration_secs: 0.0,
        artist: UNKNOWN_ARTIST.to_string(),
        size_bytes: file.size_bytes,
        mime_type: file.mime_type,
        source_path,
        added_at: Utc::now(),
    }
}
