//! Property-based tests for the playback controller
//!
//! Random action sequences must never break the playlist/selection invariants.

use playdeck::error::ResourceError;
use playdeck::persistence::MemoryStore;
use playdeck::registry::MediaSource;
use playdeck::resource::{Generation, PlaybackResource, ResourceEvent};
use playdeck::sequencing::{self, Step};
use playdeck::{Controller, EventQueue, PlayerConfig, RepeatMode, UploadFile};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accepts every command and remembers the last load generation.
#[derive(Clone, Default)]
struct NullResource {
    last_generation: Arc<AtomicU64>,
}

impl PlaybackResource for NullResource {
    fn load(&mut self, _source: &MediaSource, generation: Generation) -> Result<(), ResourceError> {
        self.last_generation.store(generation, Ordering::SeqCst);
        Ok(())
    }
    fn play(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
    fn pause(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
    fn seek(&mut self, _position_secs: f64) -> Result<(), ResourceError> {
        Ok(())
    }
    fn set_volume(&mut self, _volume: f32) -> Result<(), ResourceError> {
        Ok(())
    }
    fn stop(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Action {
    Add(usize),
    Remove(usize),
    Select(usize),
    TogglePlay,
    Next,
    Previous,
    Seek(f64),
    Volume(f32),
    Mute,
    Shuffle,
    Repeat,
    Ended,
    Clear,
}

fn arbitrary_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (1usize..4).prop_map(Action::Add),
        2 => (0usize..8).prop_map(Action::Remove),
        2 => (0usize..8).prop_map(Action::Select),
        2 => Just(Action::TogglePlay),
        2 => Just(Action::Next),
        1 => Just(Action::Previous),
        1 => (-50.0f64..500.0).prop_map(Action::Seek),
        1 => (-1.0f32..2.0).prop_map(Action::Volume),
        1 => Just(Action::Mute),
        1 => Just(Action::Shuffle),
        1 => Just(Action::Repeat),
        2 => Just(Action::Ended),
        1 => Just(Action::Clear),
    ]
}

fn controller(seed: u64) -> (Controller, NullResource) {
    let resource = NullResource::default();
    let config = PlayerConfig {
        probe_metadata: false,
        ..Default::default()
    };
    let ctl = Controller::new(
        config,
        Box::new(resource.clone()),
        Box::new(MemoryStore::new()),
        EventQueue::new(),
    )
    .with_rng(fastrand::Rng::with_seed(seed));
    (ctl, resource)
}

fn apply(ctl: &mut Controller, resource: &NullResource, action: Action) {
    match action {
        Action::Add(n) => {
            let files = (0..n)
                .map(|i| UploadFile::from_bytes(format!("t{}.mp3", i), "audio/mpeg", vec![0; 64]))
                .collect();
            ctl.add_tracks(files).ok();
        }
        Action::Remove(i) => {
            if let Some(id) = ctl.playlist().tracks.get(i).map(|t| t.id.clone()) {
                ctl.remove_track(&id).ok();
            }
        }
        Action::Select(i) => {
            ctl.select_track(i).ok();
        }
        Action::TogglePlay => ctl.toggle_play_pause(),
        Action::Next => ctl.next(),
        Action::Previous => ctl.previous(),
        Action::Seek(t) => ctl.seek(t),
        Action::Volume(v) => ctl.set_volume(v),
        Action::Mute => ctl.toggle_mute(),
        Action::Shuffle => ctl.toggle_shuffle(),
        Action::Repeat => {
            ctl.cycle_repeat_mode();
        }
        Action::Ended => {
            ctl.event_sender().resource(ResourceEvent::Ended {
                generation: resource.last_generation.load(Ordering::SeqCst),
            });
            ctl.process_events();
        }
        Action::Clear => ctl.clear_playlist(),
    }
}

proptest! {
    /// Property: selection, playing flag, volume and ids stay consistent
    #[test]
    fn controller_invariants_hold(
        seed in any::<u64>(),
        actions in prop::collection::vec(arbitrary_action(), 1..60)
    ) {
        let (mut ctl, resource) = controller(seed);
        for action in actions {
            apply(&mut ctl, &resource, action.clone());

            let len = ctl.playlist().track_count();
            match ctl.current_index() {
                None => prop_assert!(!ctl.state().is_playing, "playing without selection after {:?}", action),
                Some(i) => prop_assert!(i < len, "index {} out of range {} after {:?}", i, len, action),
            }
            let volume = ctl.state().volume;
            prop_assert!((0.0..=1.0).contains(&volume));
            let t = ctl.state().current_time_secs;
            prop_assert!(t >= 0.0 && t.is_finite());

            let ids: HashSet<&str> = ctl.playlist().tracks.iter().map(|t| t.id.as_str()).collect();
            prop_assert_eq!(ids.len(), len, "duplicate track ids");
        }
    }

    /// Property: removing a track keeps the same track selected when it survives
    #[test]
    fn removal_preserves_selected_track(
        count in 2usize..10,
        selected in 0usize..10,
        removed in 0usize..10
    ) {
        let selected = selected % count;
        let removed = removed % count;
        let (mut ctl, resource) = controller(7);
        apply(&mut ctl, &resource, Action::Add(count));
        ctl.select_track(selected).unwrap();
        let selected_id = ctl.playlist().tracks[selected].id.clone();
        let removed_id = ctl.playlist().tracks[removed].id.clone();

        ctl.remove_track(&removed_id).unwrap();

        if removed == selected {
            prop_assert_eq!(ctl.current_index(), None);
            prop_assert!(!ctl.state().is_playing);
        } else {
            prop_assert_eq!(ctl.current_track().map(|t| t.id.clone()), Some(selected_id));
            let expected = if removed < selected { selected - 1 } else { selected };
            prop_assert_eq!(ctl.current_index(), Some(expected));
        }
    }

    /// Property: sequencing only ever points inside the playlist
    #[test]
    fn sequencing_stays_in_bounds(
        len in 0usize..20,
        current in proptest::option::of(0usize..20),
        repeat in prop_oneof![Just(RepeatMode::None), Just(RepeatMode::All), Just(RepeatMode::One)],
        shuffled in any::<bool>(),
        seed in any::<u64>()
    ) {
        let current = current.filter(|&c| c < len);
        let mut rng = fastrand::Rng::with_seed(seed);
        for step in [
            sequencing::next_index(current, len, repeat, shuffled, &mut rng),
            sequencing::previous_index(current, len, repeat, shuffled, &mut rng),
        ] {
            match step {
                Step::Play(i) => prop_assert!(i < len),
                Step::EndOfPlaylist | Step::Stay => {}
            }
        }
        if len == 0 {
            prop_assert_eq!(
                sequencing::next_index(current, len, repeat, shuffled, &mut rng),
                Step::Stay
            );
        }
    }

    /// Property: repeat-one next always replays the current track
    #[test]
    fn repeat_one_next_is_fixed_point(
        len in 1usize..20,
        current in 0usize..20,
        shuffled in any::<bool>()
    ) {
        let current = current % len;
        let mut rng = fastrand::Rng::with_seed(3);
        prop_assert_eq!(
            sequencing::next_index(Some(current), len, RepeatMode::One, shuffled, &mut rng),
            Step::Play(current)
        );
    }
}
