//! Next/previous track selection for shuffle and repeat.
//!
//! These functions never touch playback state. Randomness comes from the
//! caller's `fastrand::Rng` so a seeded controller is fully reproducible.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop at the end of the playlist.
    #[default]
    None,
    /// Wrap around the playlist.
    All,
    /// Replay the current track.
    One,
}

impl RepeatMode {
    /// None -> All -> One -> None.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeatMode::None => write!(f, "none"),
            RepeatMode::All => write!(f, "all"),
            RepeatMode::One => write!(f, "one"),
        }
    }
}

/// Outcome of a sequencing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Play(usize),
    /// Ran off the end with repeat off; the caller stops playback.
    EndOfPlaylist,
    /// Empty playlist, nothing to do.
    Stay,
}

pub fn next_index(
    current: Option<usize>,
    len: usize,
    repeat: RepeatMode,
    shuffled: bool,
    rng: &mut fastrand::Rng,
) -> Step {
    if len == 0 {
        return Step::Stay;
    }
    if repeat == RepeatMode::One {
        return Step::Play(current.filter(|&i| i < len).unwrap_or(0));
    }
    if shuffled {
        return Step::Play(rng.usize(..len));
    }
    let next = current.map_or(0, |i| i + 1);
    if next < len {
        Step::Play(next)
    } else if repeat == RepeatMode::All {
        Step::Play(0)
    } else {
        Step::EndOfPlaylist
    }
}

/// Like `next_index`, but running off the front clamps to 0 instead of
/// stopping when repeat is off.
pub fn previous_index(
    current: Option<usize>,
    len: usize,
    repeat: RepeatMode,
    shuffled: bool,
    rng: &mut fastrand::Rng,
) -> Step {
    if len == 0 {
        return Step::Stay;
    }
    if repeat == RepeatMode::One {
        return Step::Play(current.filter(|&i| i < len).unwrap_or(0));
    }
    if shuffled {
        return Step::Play(rng.usize(..len));
    }
    match current {
        Some(i) if i > 0 && i <= len => Step::Play(i - 1),
        _ if repeat == RepeatMode::All => Step::Play(len - 1),
        _ => Step::Play(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> fastrand::Rng {
        fastrand::Rng::with_seed(42)
    }

    #[test]
    fn empty_playlist_is_a_no_op() {
        for repeat in [RepeatMode::None, RepeatMode::All, RepeatMode::One] {
            assert_eq!(next_index(None, 0, repeat, false, &mut rng()), Step::Stay);
            assert_eq!(previous_index(None, 0, repeat, true, &mut rng()), Step::Stay);
        }
    }

    #[test]
    fn next_advances_then_stops_at_end() {
        assert_eq!(next_index(Some(0), 3, RepeatMode::None, false, &mut rng()), Step::Play(1));
        assert_eq!(
            next_index(Some(2), 3, RepeatMode::None, false, &mut rng()),
            Step::EndOfPlaylist
        );
    }

    #[test]
    fn next_wraps_with_repeat_all() {
        assert_eq!(next_index(Some(2), 3, RepeatMode::All, false, &mut rng()), Step::Play(0));
    }

    #[test]
    fn next_without_selection_starts_at_zero() {
        assert_eq!(next_index(None, 3, RepeatMode::None, false, &mut rng()), Step::Play(0));
    }

    #[test]
    fn previous_clamps_or_wraps() {
        assert_eq!(previous_index(Some(2), 3, RepeatMode::None, false, &mut rng()), Step::Play(1));
        assert_eq!(previous_index(Some(0), 3, RepeatMode::None, false, &mut rng()), Step::Play(0));
        assert_eq!(previous_index(Some(0), 3, RepeatMode::All, false, &mut rng()), Step::Play(2));
        assert_eq!(previous_index(None, 3, RepeatMode::All, false, &mut rng()), Step::Play(2));
    }

    #[test]
    fn repeat_one_replays_current() {
        let mut r = rng();
        for _ in 0..10 {
            assert_eq!(next_index(Some(1), 3, RepeatMode::One, true, &mut r), Step::Play(1));
            assert_eq!(previous_index(Some(1), 3, RepeatMode::One, false, &mut r), Step::Play(1));
        }
    }

    #[test]
    fn shuffle_stays_in_bounds_and_covers_playlist() {
        let mut r = rng();
        let mut seen = [false; 4];
        for _ in 0..200 {
            match next_index(Some(0), 4, RepeatMode::None, true, &mut r) {
                Step::Play(i) => seen[i] = true,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn repeat_mode_cycles() {
        assert_eq!(RepeatMode::None.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::None);
    }

    #[test]
    fn repeat_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RepeatMode::All).unwrap(), "\"all\"");
        let mode: RepeatMode = serde_json::from_str("\"one\"").unwrap();
        assert_eq!(mode, RepeatMode::One);
    }
}
