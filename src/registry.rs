//! Resource handles for playable sources.
//!
//! A handle is an opaque string that stands in for the bytes a decoder can
//! read. Handles are allocated when a track is created and released when the
//! track leaves the playlist.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the audio bytes for a handle live.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owns every live handle. Owned by the controller, never shared.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    sources: HashMap<ResourceHandle, MediaSource>,
    next_id: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, source: MediaSource) -> ResourceHandle {
        self.next_id += 1;
        let handle = ResourceHandle(format!("media:{}", self.next_id));
        self.sources.insert(handle.clone(), source);
        handle
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Option<&MediaSource> {
        self.sources.get(handle)
    }

    /// Release a handle. Returns false if it was not live.
    pub fn release(&mut self, handle: &ResourceHandle) -> bool {
        self.sources.remove(handle).is_some()
    }

    pub fn release_all(&mut self) {
        self.sources.clear();
    }

    pub fn live_count(&self) -> usize {
        self.sources.len()
    }
}
