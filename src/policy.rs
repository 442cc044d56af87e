//! # Playback Policy
//!
//! Decides what the player should do given the smoothed mood and what the
//! device is currently doing. The decision is a plain value ([`Action`]);
//! applying it is the caller's job (see [`crate::device::Player::apply`]),
//! which keeps this logic testable without any audio hardware.
//!
//! ## Rules
//!
//! 1. Same mood and still playing: do nothing. A track that fits the mood is
//!    never cut off just because another track would fit too.
//! 2. Otherwise ask the catalog for the mood's tracks:
//!    - none: [`Action::ReportNoTracks`], the device is left alone;
//!    - some: pick one uniformly at random and [`Action::StartTrack`] it.
//!
//! There is no "track finished" callback. The session calls [`reconcile`]
//! every tick; once the device stops reporting `is_playing`, rule 2 kicks in
//! with the last known mood and a fresh random track follows. Sampling is
//! with replacement, so the same track can come up twice in a row.

use crate::catalog::{TrackCatalog, TrackId};
use crate::device::PlaybackState;
use crate::mood::Mood;
use log::trace;
use rand::seq::SliceRandom;
use rand::Rng;

/// A single corrective step towards "music that matches the mood is playing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp,
    StartTrack(TrackId),
    /// The catalog has nothing for this mood; tell the user.
    ReportNoTracks,
}

/// Compares the desired `mood` with the playback `state` and returns at most
/// one action.
///
/// # Examples
///
/// ```
/// use deepj::catalog::StaticCatalog;
/// use deepj::device::PlaybackState;
/// use deepj::mood::Mood;
/// use deepj::policy::{reconcile, Action};
///
/// let catalog = StaticCatalog::new().with_tracks(Mood::Calm, ["rain.ogg"]);
/// let idle = PlaybackState::default();
/// let action = reconcile(Mood::Calm, &idle, &catalog, &mut rand::thread_rng());
/// assert_eq!(action, Action::StartTrack("rain.ogg".to_string()));
/// ```
pub fn reconcile<C, R>(mood: Mood, state: &PlaybackState, catalog: &C, rng: &mut R) -> Action
where
    C: TrackCatalog + ?Sized,
    R: Rng + ?Sized,
{
    if state.is_playing && state.current_mood == Some(mood) {
        return Action::NoOp;
    }

    let tracks = catalog.tracks_for(mood);
    trace!("{} candidate track(s) for {mood}", tracks.len());

    match tracks.choose(rng) {
        Some(track) => Action::StartTrack(track.clone()),
        None => Action::ReportNoTracks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_tracks(Mood::Calm, ["calm/a.mp3", "calm/b.mp3", "calm/c.mp3"])
            .with_tracks(Mood::Energetic, ["energetic/a.flac"])
    }

    fn playing(mood: Mood, track: &str) -> PlaybackState {
        PlaybackState {
            current_mood: Some(mood),
            current_track: Some(track.to_string()),
            is_playing: true,
            ..PlaybackState::default()
        }
    }

    #[test]
    fn test_same_mood_playing_is_noop() {
        let mut rng = StdRng::seed_from_u64(7);
        let state = playing(Mood::Calm, "calm/a.mp3");
        for _ in 0..50 {
            assert_eq!(reconcile(Mood::Calm, &state, &catalog(), &mut rng), Action::NoOp);
        }
    }

    #[test]
    fn test_idle_starts_track() {
        let mut rng = StdRng::seed_from_u64(1);
        let action = reconcile(Mood::Energetic, &PlaybackState::default(), &catalog(), &mut rng);
        assert_eq!(action, Action::StartTrack("energetic/a.flac".into()));
    }

    #[test]
    fn test_mood_change_starts_track_of_new_mood() {
        let mut rng = StdRng::seed_from_u64(2);
        let state = playing(Mood::Calm, "calm/a.mp3");
        let action = reconcile(Mood::Energetic, &state, &catalog(), &mut rng);
        assert_eq!(action, Action::StartTrack("energetic/a.flac".into()));
    }

    #[test]
    fn test_track_ended_same_mood_picks_again() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = playing(Mood::Calm, "calm/a.mp3");
        state.is_playing = false;

        match reconcile(Mood::Calm, &state, &catalog(), &mut rng) {
            Action::StartTrack(track) => assert!(track.starts_with("calm/")),
            other => panic!("expected StartTrack, got {other:?}"),
        }
    }

    #[test]
    fn test_no_tracks_reported() {
        let mut rng = StdRng::seed_from_u64(4);
        let state = playing(Mood::Calm, "calm/a.mp3");
        assert_eq!(
            reconcile(Mood::Intense, &state, &catalog(), &mut rng),
            Action::ReportNoTracks
        );
        assert_eq!(
            reconcile(Mood::Melancholic, &PlaybackState::default(), &catalog(), &mut rng),
            Action::ReportNoTracks
        );
    }

    #[test]
    fn test_same_mood_not_playing_without_tracks() {
        let mut rng = StdRng::seed_from_u64(5);
        let state = PlaybackState {
            current_mood: Some(Mood::Intense),
            ..PlaybackState::default()
        };
        assert_eq!(
            reconcile(Mood::Intense, &state, &catalog(), &mut rng),
            Action::ReportNoTracks
        );
    }

    #[test]
    fn test_selection_covers_all_tracks() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();
        for _ in 0..200 {
            if let Action::StartTrack(track) =
                reconcile(Mood::Calm, &PlaybackState::default(), &catalog(), &mut rng)
            {
                seen.insert(track);
            }
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10)
                .map(|_| reconcile(Mood::Calm, &PlaybackState::default(), &catalog(), &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(99), pick(99));
    }
}
