//! # DJ Session
//!
//! The application loop that ties everything together. One tick per frame:
//!
//! ```text
//! controls → next frame → smoother.update → reconcile → player.apply
//! ```
//!
//! The loop is single-threaded and cooperative. User controls (pause,
//! volume, quit) arrive through an `mpsc` channel and are drained at the
//! start of each tick, so the playback device only ever has one writer and a
//! quit request is noticed at most one tick late. A classification that is
//! already running is never interrupted.
//!
//! While paused the session keeps tracking the mood but does not reconcile;
//! after resuming, the next tick switches music if the mood moved on.
//!
//! The session ends when the frame source is exhausted or on quit. Either
//! way playback is stopped before [`Session::run`] returns.

use crate::catalog::TrackCatalog;
use crate::classifier::EmotionClassifier;
use crate::device::{Applied, PlaybackDevice, Player};
use crate::frames::FrameSource;
use crate::mood::Mood;
use crate::policy::reconcile;
use crate::smoother::{Detection, MoodSmoother};
use anyhow::Result;
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Default volume change per `+` / `-` key press.
pub const DEFAULT_VOLUME_STEP: f32 = 0.1;

/// User input the session reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    TogglePause,
    VolumeUp,
    VolumeDown,
    Quit,
}

impl Control {
    /// Maps a typed key or word to a control. Unknown input is `None`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        if input == " " {
            return Some(Control::TogglePause);
        }
        match input.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" | "resume" | "space" => Some(Control::TogglePause),
            "+" | "=" | "up" => Some(Control::VolumeUp),
            "-" | "_" | "down" => Some(Control::VolumeDown),
            "q" | "quit" | "exit" => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The frame source ran dry (camera gone, recording over).
    EndOfStream,
    Quit,
}

/// Outcome of one [`Session::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue(Mood),
    Stopped(StopReason),
}

/// Counters collected over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub ticks: u64,
    pub classifications: u64,
    pub missed_detections: u64,
    pub mood_changes: u64,
    pub tracks_started: u64,
    pub play_failures: u64,
    pub final_mood: Mood,
    pub stop_reason: Option<StopReason>,
}

/// Tunables that are not owned by a single component.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub volume_step: f32,
    /// Pause between ticks in [`Session::run`]; zero runs flat out.
    pub frame_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            volume_step: DEFAULT_VOLUME_STEP,
            frame_interval: Duration::ZERO,
        }
    }
}

/// A running DJ: frame source, smoother, player and catalog.
pub struct Session<S, C, D, K, R> {
    frames: S,
    smoother: MoodSmoother<C>,
    player: Player<D>,
    catalog: K,
    rng: R,
    controls: Option<Receiver<Control>>,
    options: SessionOptions,
    last_mood: Option<Mood>,
    quit_requested: bool,
    summary: SessionSummary,
}

impl<S, C, D, K, R> Session<S, C, D, K, R>
where
    S: FrameSource<Frame = C::Frame>,
    C: EmotionClassifier,
    D: PlaybackDevice,
    K: TrackCatalog,
    R: Rng,
{
    pub fn new(
        frames: S,
        smoother: MoodSmoother<C>,
        player: Player<D>,
        catalog: K,
        rng: R,
    ) -> Self {
        Self {
            frames,
            smoother,
            player,
            catalog,
            rng,
            controls: None,
            options: SessionOptions::default(),
            last_mood: None,
            quit_requested: false,
            summary: SessionSummary::default(),
        }
    }

    #[must_use]
    pub fn with_controls(mut self, controls: Receiver<Control>) -> Self {
        self.controls = Some(controls);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs until the frames run out or the user quits, then stops playback.
    ///
    /// # Errors
    ///
    /// Only stopping the device at the end can fail; everything during the
    /// loop is recovered and logged.
    pub fn run(mut self) -> Result<SessionSummary> {
        info!("Starting mood detection...");

        let reason = loop {
            match self.tick(Instant::now()) {
                Tick::Continue(_) => {
                    if !self.options.frame_interval.is_zero() {
                        std::thread::sleep(self.options.frame_interval);
                    }
                }
                Tick::Stopped(reason) => break reason,
            }
        };

        match reason {
            StopReason::EndOfStream => warn!("Frame source exhausted, shutting down"),
            StopReason::Quit => info!("Shutting down..."),
        }

        self.player.stop()?;
        info!("Cleanup complete");
        Ok(self.summary)
    }

    /// Performs one cycle as of `now`.
    pub fn tick(&mut self, now: Instant) -> Tick {
        self.drain_controls();
        if self.quit_requested {
            return self.finish(StopReason::Quit);
        }

        let Some(frame) = self.frames.next_frame() else {
            return self.finish(StopReason::EndOfStream);
        };
        self.summary.ticks += 1;

        let outcome = self.smoother.update_detailed(&frame, now);
        match outcome.detection {
            Detection::Classified(_) => self.summary.classifications += 1,
            Detection::Missed(_) => self.summary.missed_detections += 1,
            Detection::RateLimited => {}
        }

        let mood = outcome.mood;
        self.summary.final_mood = mood;
        if self.last_mood != Some(mood) {
            match self.last_mood {
                Some(previous) => info!("Mood changed: {previous} -> {mood}"),
                None => info!("Initial mood: {mood}"),
            }
            self.summary.mood_changes += 1;
            self.last_mood = Some(mood);
        }

        if self.player.is_paused() {
            return Tick::Continue(mood);
        }

        let state = self.player.refresh().clone();
        let action = reconcile(mood, &state, &self.catalog, &mut self.rng);
        match self.player.apply(mood, action) {
            Applied::Started(_) => self.summary.tracks_started += 1,
            Applied::Failed(_) => self.summary.play_failures += 1,
            Applied::Nothing | Applied::NoTracks => {}
        }

        Tick::Continue(mood)
    }

    fn drain_controls(&mut self) {
        let Some(controls) = &self.controls else {
            return;
        };

        let mut pending = Vec::new();
        let mut disconnected = false;
        loop {
            match controls.try_recv() {
                Ok(control) => pending.push(control),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected {
            debug!("Control channel closed");
            self.controls = None;
        }

        for control in pending {
            self.handle_control(control);
        }
    }

    fn handle_control(&mut self, control: Control) {
        let step = self.options.volume_step;
        let result = match control {
            Control::TogglePause => self.player.toggle_pause(),
            Control::VolumeUp => self.player.adjust_volume(step).map(|_| ()),
            Control::VolumeDown => self.player.adjust_volume(-step).map(|_| ()),
            Control::Quit => {
                self.quit_requested = true;
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Control {control:?} failed: {e:#}");
        }
    }

    fn finish(&mut self, reason: StopReason) -> Tick {
        self.summary.stop_reason = Some(reason);
        Tick::Stopped(reason)
    }

    #[must_use]
    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    #[must_use]
    pub fn player(&self) -> &Player<D> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut Player<D> {
        &mut self.player
    }

    #[must_use]
    pub fn smoother(&self) -> &MoodSmoother<C> {
        &self.smoother
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::classifier::LabelClassifier;
    use crate::device::SimulatedDevice;
    use crate::frames::IterFrames;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::mpsc;

    type TestSession = Session<
        IterFrames<std::vec::IntoIter<String>>,
        LabelClassifier,
        SimulatedDevice,
        StaticCatalog,
        StdRng,
    >;

    fn session(labels: &[&str], catalog: StaticCatalog) -> TestSession {
        let frames = IterFrames(
            labels
                .iter()
                .map(|l| (*l).to_string())
                .collect::<Vec<_>>()
                .into_iter(),
        );
        let smoother = MoodSmoother::new(LabelClassifier::new(), 5, Duration::from_secs(1));
        let player = Player::new(SimulatedDevice::new(Duration::from_secs(3600)), 0.7);
        Session::new(frames, smoother, player, catalog, StdRng::seed_from_u64(11))
    }

    fn full_catalog() -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        for mood in Mood::ALL {
            catalog = catalog.with_tracks(mood, [format!("/music/{mood}/a.mp3")]);
        }
        catalog
    }

    #[test]
    fn test_control_parse() {
        assert_eq!(Control::parse(" "), Some(Control::TogglePause));
        assert_eq!(Control::parse("p"), Some(Control::TogglePause));
        assert_eq!(Control::parse("+"), Some(Control::VolumeUp));
        assert_eq!(Control::parse("="), Some(Control::VolumeUp));
        assert_eq!(Control::parse("-"), Some(Control::VolumeDown));
        assert_eq!(Control::parse("Q"), Some(Control::Quit));
        assert_eq!(Control::parse("x"), None);
    }

    #[test]
    fn test_first_tick_starts_music() {
        let mut session = session(&["happy"], full_catalog());
        assert_eq!(session.tick(Instant::now()), Tick::Continue(Mood::Energetic));

        let state = session.player().state();
        assert!(state.is_playing);
        assert_eq!(state.current_mood, Some(Mood::Energetic));
        assert_eq!(session.summary().tracks_started, 1);
    }

    #[test]
    fn test_same_mood_does_not_restart() {
        let mut session = session(&["happy", "happy", "happy"], full_catalog());
        let start = Instant::now();
        for i in 0..3 {
            session.tick(start + Duration::from_secs(i));
        }
        assert_eq!(session.player().device().history.len(), 1);
    }

    #[test]
    fn test_track_end_triggers_new_track_same_mood() {
        let mut session = session(&["neutral", "neutral"], full_catalog());
        let start = Instant::now();
        session.tick(start);
        session.player_mut().device_mut().finish_track();
        session.tick(start + Duration::from_millis(10));

        let history = &session.player().device().history;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|t| t.contains("/calm/")));
    }

    #[test]
    fn test_mood_change_switches_track() {
        let mut session = session(&["sad", "angry", "angry"], full_catalog());
        let start = Instant::now();
        for i in 0..3 {
            session.tick(start + Duration::from_secs(i));
        }
        // sad, then tie sad/angry goes to angry (most recent).
        assert_eq!(session.summary().final_mood, Mood::Intense);
        let history = &session.player().device().history;
        assert_eq!(history.len(), 2);
        assert!(history[0].contains("/melancholic/"));
        assert!(history[1].contains("/intense/"));
    }

    #[test]
    fn test_missing_tracks_leave_device_untouched() {
        let catalog = StaticCatalog::new().with_tracks(Mood::Calm, ["/music/calm/a.mp3"]);
        let mut session = session(&["angry", "angry"], catalog);
        let start = Instant::now();
        session.tick(start);
        session.tick(start + Duration::from_secs(1));

        assert!(session.player().device().history.is_empty());
        assert!(!session.player().state().is_playing);
    }

    #[test]
    fn test_end_of_stream() {
        let mut session = session(&["happy"], full_catalog());
        let start = Instant::now();
        session.tick(start);
        assert_eq!(
            session.tick(start + Duration::from_secs(1)),
            Tick::Stopped(StopReason::EndOfStream)
        );
        assert_eq!(session.summary().stop_reason, Some(StopReason::EndOfStream));
    }

    #[test]
    fn test_run_stops_device() -> Result<()> {
        let summary = session(&["happy", "none", "sad"], full_catalog()).run()?;
        assert_eq!(summary.ticks, 3);
        // Ticks run back to back, so only the first one classifies.
        assert_eq!(summary.classifications, 1);
        assert_eq!(summary.stop_reason, Some(StopReason::EndOfStream));
        Ok(())
    }

    #[test]
    fn test_quit_control() {
        let (tx, rx) = mpsc::channel();
        let mut session = session(&["happy", "happy"], full_catalog()).with_controls(rx);
        let start = Instant::now();
        session.tick(start);

        tx.send(Control::Quit).unwrap();
        assert_eq!(
            session.tick(start + Duration::from_secs(1)),
            Tick::Stopped(StopReason::Quit)
        );
        assert_eq!(session.summary().ticks, 1);
    }

    #[test]
    fn test_volume_controls() {
        let (tx, rx) = mpsc::channel();
        let mut session = session(&["happy"; 4], full_catalog()).with_controls(rx);
        let start = Instant::now();

        for _ in 0..5 {
            tx.send(Control::VolumeUp).unwrap();
        }
        session.tick(start);
        assert_eq!(session.player().state().volume, 1.0);

        tx.send(Control::VolumeDown).unwrap();
        session.tick(start + Duration::from_secs(1));
        assert!((session.player().state().volume - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_pause_suspends_reconcile() {
        let (tx, rx) = mpsc::channel();
        let mut session =
            session(&["happy", "sad", "sad", "sad", "sad"], full_catalog()).with_controls(rx);
        let start = Instant::now();
        session.tick(start);
        assert_eq!(session.player().device().history.len(), 1);

        tx.send(Control::TogglePause).unwrap();
        for i in 1..4 {
            session.tick(start + Duration::from_secs(i));
        }
        assert!(session.player().is_paused());
        assert_eq!(session.player().device().history.len(), 1);

        tx.send(Control::TogglePause).unwrap();
        session.tick(start + Duration::from_secs(4));
        // Resumed with a new mood: the melancholic track takes over.
        let history = &session.player().device().history;
        assert_eq!(history.len(), 2);
        assert!(history[1].contains("/melancholic/"));
    }
}
