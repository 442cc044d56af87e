//! # MPD Playback Device
//!
//! Plays tracks through Music Player Daemon using the `mpc` command-line
//! client, the same way you would by hand:
//!
//! ```text
//! load(track)   → mpc clear && mpc add <track relative to MPD's music_directory>
//! play()        → mpc play
//! pause()       → mpc pause
//! resume()      → mpc play
//! stop()        → mpc stop
//! set_volume(v) → mpc volume <v * 100>
//! status()      → mpc status -f %file%
//! ```
//!
//! MPD only accepts paths relative to its own `music_directory`, so the
//! mood folders must live inside it. The directory is taken from the
//! DeepJ configuration when set, otherwise read from `mpd.conf`.
//!
//! `MPD_HOST` / `MPD_PORT` are honoured by `mpc` itself.

use crate::device::{PlaybackDevice, PlaybackStatus};
use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Player state as printed by `mpc status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpdState {
    Play,
    Pause,
    Stop,
}

/// Parsed `mpc status -f %file%` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpdStatus {
    /// Current song, relative to MPD's music directory.
    pub current_file: Option<String>,
    pub state: MpdState,
    /// Percent, `None` when MPD reports `n/a` (no mixer).
    pub volume: Option<u8>,
}

/// Parses the output of `mpc status -f %file%`.
///
/// While playing or paused `mpc` prints three lines:
///
/// ```text
/// calm/rain.ogg
/// [playing] #1/1   0:32/3:45 (13%)
/// volume: 70%   repeat: off   random: off   single: off   consume: off
/// ```
///
/// When stopped only the `volume:` line is printed.
#[must_use]
pub fn parse_status(output: &str) -> MpdStatus {
    let mut current_file = None;
    let mut state = MpdState::Stop;
    let mut volume = None;

    for (index, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("[playing]") {
            state = MpdState::Play;
        } else if line.starts_with("[paused]") {
            state = MpdState::Pause;
        } else if let Some(rest) = line.strip_prefix("volume:") {
            volume = rest
                .split_whitespace()
                .next()
                .and_then(|v| v.trim_end_matches('%').parse::<u8>().ok());
        } else if index == 0 {
            current_file = Some(line.to_string());
        }
    }

    // A file line with no [playing]/[paused] line is not a current song.
    if state == MpdState::Stop {
        current_file = None;
    }

    MpdStatus {
        current_file,
        state,
        volume,
    }
}

/// Reads `music_directory` out of an `mpd.conf`.
///
/// `~` is expanded to the home directory. Returns `None` when the setting
/// is missing.
#[must_use]
pub fn parse_music_directory(config: &str) -> Option<PathBuf> {
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.is_empty() {
            continue;
        }

        let Some(rest) = line.strip_prefix("music_directory") else {
            continue;
        };
        let path_str = rest.trim().trim_matches('"').trim_matches('\'');
        if path_str.is_empty() {
            continue;
        }

        let expanded = match path_str.strip_prefix("~/") {
            Some(stripped) => dirs::home_dir()
                .map(|home| home.join(stripped))
                .unwrap_or_else(|| PathBuf::from(path_str)),
            None => PathBuf::from(path_str),
        };
        return Some(expanded);
    }
    None
}

/// Looks through the usual `mpd.conf` locations for a `music_directory`
/// that exists.
///
/// # Errors
///
/// Fails when no readable config names an existing directory.
pub fn detect_music_directory() -> Result<PathBuf> {
    let candidates = [
        dirs::config_dir().map(|p| p.join("mpd").join("mpd.conf")),
        dirs::home_dir().map(|p| p.join(".config").join("mpd").join("mpd.conf")),
        dirs::home_dir().map(|p| p.join(".mpdconf")),
        Some(PathBuf::from("/etc/mpd.conf")),
        Some(PathBuf::from("/usr/local/etc/mpd.conf")),
    ];

    for path in candidates.iter().flatten() {
        let Ok(content) = fs::read_to_string(path) else {
            continue;
        };
        debug!("Parsing MPD config: {}", path.display());

        match parse_music_directory(&content) {
            Some(dir) if dir.is_dir() => {
                info!("Found MPD music directory from config: {}", dir.display());
                return Ok(dir);
            }
            Some(dir) => warn!("Music directory in {} does not exist: {}", path.display(), dir.display()),
            None => {}
        }
    }

    Err(anyhow!(
        "Could not determine MPD's music directory. Set \"mpd_music_dir\" in the DeepJ \
         config or add music_directory to mpd.conf"
    ))
}

/// Converts an absolute track path into the form `mpc add` expects.
///
/// # Errors
///
/// Fails if `track` is not absolute or lies outside `music_dir`.
pub fn to_mpd_relative(track: &str, music_dir: &Path) -> Result<String> {
    let path = Path::new(track);
    if !path.is_absolute() {
        bail!("Path is not absolute: '{track}'. Expected full filesystem path.");
    }

    let relative = path.strip_prefix(music_dir).map_err(|_| {
        anyhow!(
            "Track '{track}' is not within MPD music directory '{}'. \
             Keep the mood folders inside MPD's music_directory.",
            music_dir.display()
        )
    })?;

    let relative = relative.to_string_lossy().replace('\\', "/");
    if relative.is_empty() {
        bail!("Track '{track}' is the MPD music directory itself");
    }
    Ok(relative)
}

/// Playback device backed by MPD.
#[derive(Debug, Clone)]
pub struct MpdDevice {
    music_dir: PathBuf,
}

impl MpdDevice {
    /// Checks that `mpc` can reach MPD and resolves its music directory.
    ///
    /// # Errors
    ///
    /// Fails if `mpc` is missing, MPD is not running, or the music directory
    /// cannot be determined.
    pub fn connect(music_dir: Option<PathBuf>) -> Result<Self> {
        check_client()?;
        let music_dir = match music_dir {
            Some(dir) => dir,
            None => detect_music_directory()?,
        };
        info!("Using MPD with music directory {}", music_dir.display());
        Ok(Self { music_dir })
    }

    #[must_use]
    pub fn music_dir(&self) -> &Path {
        &self.music_dir
    }
}

/// Verifies that `mpc` is installed and MPD answers.
///
/// # Errors
///
/// Returns an error describing which of the two is missing.
pub fn check_client() -> Result<()> {
    let output = Command::new("mpc")
        .arg("version")
        .output()
        .context("Failed to execute mpc command. Please install mpc (MPD client)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "Failed to connect to MPD. Make sure MPD is running on localhost:6600.\nError: {}",
            stderr.trim()
        );
    }
    Ok(())
}

/// Runs `mpc` with `args` and returns its stdout.
fn mpc(args: &[&str]) -> Result<String> {
    debug!("mpc {}", args.join(" "));
    let output = Command::new("mpc")
        .args(args)
        .output()
        .with_context(|| format!("Failed to execute mpc {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("mpc {} failed: {}", args.join(" "), stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl PlaybackDevice for MpdDevice {
    fn load(&mut self, track: &str) -> Result<()> {
        let relative = to_mpd_relative(track, &self.music_dir)?;
        mpc(&["clear"]).context("Failed to clear MPD queue")?;
        mpc(&["add", &relative]).with_context(|| format!("Failed to add {relative} to MPD"))?;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        mpc(&["play"]).context("Failed to start playback")?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        mpc(&["pause"])?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        mpc(&["play"])?;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        mpc(&["stop"])?;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<()> {
        let percent = (volume * 100.0).round() as u8;
        mpc(&["volume", &percent.to_string()])?;
        Ok(())
    }

    fn status(&mut self) -> Result<PlaybackStatus> {
        let status = parse_status(&mpc(&["status", "-f", "%file%"])?);
        Ok(PlaybackStatus {
            is_playing: status.state == MpdState::Play,
            current_track: status
                .current_file
                .map(|file| self.music_dir.join(file).to_string_lossy().into_owned()),
            volume: f32::from(status.volume.unwrap_or(0)) / 100.0,
        })
    }
}
