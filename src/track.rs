use crate::registry::ResourceHandle;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
/// Anything longer is treated as a corrupt value.
pub const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub source: ResourceHandle,
    /// Seconds; 0 while unknown.
    pub duration_secs: f64,
    pub artist: String,
    pub size_bytes: u64,
    pub mime_type: String,
    /// On-disk origin, if any. Used to re-resolve the track after a restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    pub added_at: DateTime<Utc>,
}

impl Track {
    /// Record a resolved duration. Only the first known value sticks.
    pub fn resolve_duration(&mut self, secs: f64) -> bool {
        let secs = sanitize_duration(secs);
        if self.duration_secs > 0.0 || secs <= 0.0 {
            return false;
        }
        self.duration_secs = secs;
        true
    }

    /// Format duration as M:SS.
    pub fn duration_display(&self) -> String {
        format_duration(self.duration_secs)
    }

    pub fn size_display(&self) -> String {
        format_size(self.size_bytes)
    }
}

/// Generate a track id of the form `audio_<millis>_<9 base36 chars>`.
pub fn generate_id(rng: &mut fastrand::Rng) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.usize(..ALPHABET.len())] as char)
        .collect();
    format!("audio_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Usable duration in seconds, or 0 when unknown or implausible.
pub fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 && secs <= MAX_DURATION_SECS {
        secs
    } else {
        0.0
    }
}

pub fn format_duration(secs: f64) -> String {
    if !secs.is_finite() || secs <= 0.0 {
        return "0:00".to_string();
    }
    let secs = secs as u64;
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MediaSource, ResourceRegistry};

    fn make_track(duration_secs: f64) -> Track {
        let mut reg = ResourceRegistry::new();
        Track {
            id: "t1".into(),
            name: "Test".into(),
            source: reg.allocate(MediaSource::Path("test.mp3".into())),
            duration_secs,
            artist: UNKNOWN_ARTIST.into(),
            size_bytes: 0,
            mime_type: "audio/mpeg".into(),
            source_path: None,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn duration_display_formats_correctly() {
        assert_eq!(make_track(185.0).duration_display(), "3:05");
        assert_eq!(make_track(0.0).duration_display(), "0:00");
        assert_eq!(format_duration(f64::NAN), "0:00");
    }

    #[test]
    fn resolve_duration_applies_once() {
        let mut track = make_track(0.0);
        assert!(!track.resolve_duration(-1.0));
        assert!(track.resolve_duration(42.5));
        assert!(!track.resolve_duration(99.0));
        assert_eq!(track.duration_secs, 42.5);
    }

    #[test]
    fn implausible_durations_count_as_unknown() {
        assert_eq!(sanitize_duration(1e300), 0.0);
        assert_eq!(sanitize_duration(f64::INFINITY), 0.0);
        assert_eq!(sanitize_duration(-3.0), 0.0);
        assert_eq!(sanitize_duration(240.0), 240.0);
        let mut track = make_track(0.0);
        assert!(!track.resolve_duration(MAX_DURATION_SECS * 2.0));
        assert_eq!(track.duration_secs, 0.0);
    }

    #[test]
    fn size_display_uses_binary_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(50 * 1024 * 1024), "50 MB");
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        let mut rng = fastrand::Rng::with_seed(7);
        let a = generate_id(&mut rng);
        let b = generate_id(&mut rng);
        assert!(a.starts_with("audio_"));
        assert_eq!(a.rsplit('_').next().unwrap().len(), 9);
        assert_ne!(a, b);
    }
}
