//! # Playback Device
//!
//! The audio engine is external. [`PlaybackDevice`] is the transport it has
//! to offer: load, play, pause, resume, stop, volume and a status query.
//! Two devices ship with DeepJ:
//!
//! - [`crate::mpd::MpdDevice`] drives a running MPD through `mpc`;
//! - [`SimulatedDevice`] plays nothing, it only keeps time. Used for dry
//!   runs and tests.
//!
//! [`Player`] owns one device instance for the lifetime of a session and is
//! the only thing that mutates it. It keeps the [`PlaybackState`] the policy
//! reads, and applies the policy's [`Action`]s.

use crate::catalog::TrackId;
use crate::mood::Mood;
use crate::policy::Action;
use anyhow::Result;
use log::{debug, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

/// Volume used when nothing else is configured.
pub const DEFAULT_VOLUME: f32 = 0.7;

/// Clamps a requested volume into `[0.0, 1.0]`. NaN becomes silence.
#[must_use]
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// What the device reports about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub is_playing: bool,
    pub current_track: Option<TrackId>,
    pub volume: f32,
}

/// Opaque audio transport.
pub trait PlaybackDevice {
    /// Makes `track` the current track without starting it.
    fn load(&mut self, track: &str) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn resume(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// `volume` is already clamped to `[0, 1]` by the caller.
    fn set_volume(&mut self, volume: f32) -> Result<()>;
    fn status(&mut self) -> Result<PlaybackStatus>;
}

impl<D: PlaybackDevice + ?Sized> PlaybackDevice for Box<D> {
    fn load(&mut self, track: &str) -> Result<()> {
        (**self).load(track)
    }
    fn play(&mut self) -> Result<()> {
        (**self).play()
    }
    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }
    fn resume(&mut self) -> Result<()> {
        (**self).resume()
    }
    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
    fn set_volume(&mut self, volume: f32) -> Result<()> {
        (**self).set_volume(volume)
    }
    fn status(&mut self) -> Result<PlaybackStatus> {
        (**self).status()
    }
}

/// Playback state as the policy sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Mood of the track last started, `None` before the first track.
    pub current_mood: Option<Mood>,
    pub current_track: Option<TrackId>,
    pub is_playing: bool,
    pub volume: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_mood: None,
            current_track: None,
            is_playing: false,
            volume: DEFAULT_VOLUME,
        }
    }
}

/// What [`Player::apply`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Nothing,
    Started(TrackId),
    /// The device refused the track; the next tick will try again.
    Failed(TrackId),
    NoTracks,
}

/// Owns the playback device and the state the policy reasons about.
#[derive(Debug)]
pub struct Player<D> {
    device: D,
    state: PlaybackState,
    paused: bool,
    /// Mood we last warned about having no tracks, to warn once per mood.
    reported_empty: Option<Mood>,
}

impl<D: PlaybackDevice> Player<D> {
    /// Wraps `device` and applies the initial volume.
    ///
    /// A device without volume control (MPD with no mixer) still plays, so a
    /// rejected volume is logged and playback goes on at whatever level the
    /// device has.
    pub fn new(mut device: D, volume: f32) -> Self {
        let volume = clamp_volume(volume);
        if let Err(e) = device.set_volume(volume) {
            warn!("Could not set initial volume: {e:#}");
        }
        Self {
            device,
            state: PlaybackState {
                volume,
                ..PlaybackState::default()
            },
            paused: false,
            reported_empty: None,
        }
    }

    /// Current state, with `is_playing` refreshed from the device.
    ///
    /// A track that finished on its own shows up here as `is_playing ==
    /// false`; that is what makes the policy queue the next one.
    pub fn refresh(&mut self) -> &PlaybackState {
        if self.state.is_playing {
            match self.device.status() {
                Ok(status) => {
                    if !status.is_playing {
                        debug!("Track finished: {:?}", self.state.current_track);
                        self.state.is_playing = false;
                    }
                }
                Err(e) => {
                    warn!("Could not query playback device: {e:#}");
                    self.state.is_playing = false;
                }
            }
        }
        &self.state
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Carries out a policy decision for `mood`.
    ///
    /// Device failures are logged, not returned: the state is left "not
    /// playing" so the next reconciliation retries.
    pub fn apply(&mut self, mood: Mood, action: Action) -> Applied {
        match action {
            Action::NoOp => Applied::Nothing,
            Action::ReportNoTracks => {
                if self.reported_empty != Some(mood) {
                    warn!("No tracks found for mood: {mood}. Add music files to its '{mood}' folder");
                    self.reported_empty = Some(mood);
                }
                Applied::NoTracks
            }
            Action::StartTrack(track) => {
                let started = self.device.load(&track).and_then(|()| self.device.play());
                match started {
                    Ok(()) => {
                        info!("Now playing: {} (Mood: {mood})", display_name(&track));
                        self.state.current_mood = Some(mood);
                        self.state.current_track = Some(track.clone());
                        self.state.is_playing = true;
                        self.paused = false;
                        self.reported_empty = None;
                        Applied::Started(track)
                    }
                    Err(e) => {
                        warn!("Error playing track {track}: {e:#}");
                        self.state.is_playing = false;
                        Applied::Failed(track)
                    }
                }
            }
        }
    }

    /// Pauses if playing, resumes if paused. Does nothing when idle.
    pub fn toggle_pause(&mut self) -> Result<()> {
        if self.paused {
            self.resume()
        } else if self.state.is_playing {
            self.pause()
        } else {
            Ok(())
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        self.device.pause()?;
        self.paused = true;
        self.state.is_playing = false;
        info!("Music paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.device.resume()?;
        self.paused = false;
        self.state.is_playing = self.state.current_track.is_some();
        info!("Music resumed");
        Ok(())
    }

    /// Stops playback and forgets the current track.
    pub fn stop(&mut self) -> Result<()> {
        self.device.stop()?;
        self.paused = false;
        self.state.is_playing = false;
        self.state.current_track = None;
        Ok(())
    }

    /// Sets the volume, clamped to `[0, 1]`. Returns the stored value.
    pub fn set_volume(&mut self, volume: f32) -> Result<f32> {
        let volume = clamp_volume(volume);
        self.device.set_volume(volume)?;
        self.state.volume = volume;
        info!("Volume: {}%", (volume * 100.0).round() as u32);
        Ok(volume)
    }

    /// Moves the volume by `delta` (negative to lower it).
    pub fn adjust_volume(&mut self, delta: f32) -> Result<f32> {
        self.set_volume(self.state.volume + delta)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

/// File name of a track for log output.
fn display_name(track: &str) -> String {
    Path::new(track)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| track.to_string())
}

/// A device that only keeps time.
///
/// A loaded track counts as playing for `track_length` of unpaused time
/// after `play`, then reports itself finished.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    track_length: Duration,
    loaded: Option<TrackId>,
    started_at: Option<Instant>,
    played_before_pause: Duration,
    volume: f32,
    /// Every track passed to `play`, in order.
    pub history: Vec<TrackId>,
}

impl SimulatedDevice {
    #[must_use]
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length,
            loaded: None,
            started_at: None,
            played_before_pause: Duration::ZERO,
            volume: DEFAULT_VOLUME,
            history: Vec::new(),
        }
    }

    fn played(&self) -> Duration {
        self.played_before_pause
            + self
                .started_at
                .map(|start| start.elapsed())
                .unwrap_or(Duration::ZERO)
    }

    /// Ends the current track immediately, as if it had run to completion.
    pub fn finish_track(&mut self) {
        self.started_at = None;
        self.played_before_pause = self.track_length;
    }
}

impl PlaybackDevice for SimulatedDevice {
    fn load(&mut self, track: &str) -> Result<()> {
        self.loaded = Some(track.to_string());
        self.started_at = None;
        self.played_before_pause = Duration::ZERO;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let Some(track) = self.loaded.clone() else {
            anyhow::bail!("No track loaded");
        };
        self.history.push(track);
        self.played_before_pause = Duration::ZERO;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(start) = self.started_at.take() {
            self.played_before_pause += start.elapsed();
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if self.loaded.is_some() && self.started_at.is_none() && self.played() < self.track_length
        {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.loaded = None;
        self.started_at = None;
        self.played_before_pause = Duration::ZERO;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        self.volume = volume;
        Ok(())
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        let is_playing = self.loaded.is_some()
            && self.started_at.is_some()
            && self.played() < self.track_length;
        Ok(PlaybackStatus {
            is_playing,
            current_track: self.loaded.clone(),
            volume: self.volume,
        })
    }
}
