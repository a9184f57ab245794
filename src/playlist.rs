use crate::error::ControllerError;
use crate::track::Track;

/// Ordered tracks plus the current selection.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    pub tracks: Vec<Track>,
    pub current_index: Option<usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tracks, keeping their order. Returns the index of the first one.
    pub fn append(&mut self, tracks: Vec<Track>) -> usize {
        let first = self.tracks.len();
        self.tracks.extend(tracks);
        first
    }

    /// Remove a track by index. Returns the removed track.
    pub fn remove_track(&mut self, index: usize) -> Result<Track, ControllerError> {
        if index >= self.tracks.len() {
            return Err(ControllerError::IndexOutOfRange {
                index,
                len: self.tracks.len(),
            });
        }
        let track = self.tracks.remove(index);
        // Keep pointing at the same logical track
        if let Some(ci) = self.current_index {
            if index < ci {
                self.current_index = Some(ci - 1);
            } else if index == ci {
                self.current_index = None;
            }
        }
        Ok(track)
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|i| self.tracks.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        self.current_index.and_then(|i| self.tracks.get_mut(i))
    }

    /// Drop every track and the selection. Returns the removed tracks.
    pub fn clear(&mut self) -> Vec<Track> {
        self.current_index = None;
        std::mem::take(&mut self.tracks)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
