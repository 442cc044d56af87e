//! # Configuration Module
//!
//! Runtime settings for DeepJ and the platform directories they live in.
//!
//! Settings are resolved in three layers, later ones winning:
//!
//! 1. built-in defaults ([`RuntimeConfig::default`]);
//! 2. the JSON config file, `config.json` in the platform config directory
//!    (or a file passed with `--config`);
//! 3. command-line flags.
//!
//! ## Locations
//!
//! - Linux: `~/.config/deepj/config.json`, music in `~/.local/share/deepj/music/`
//! - macOS: `~/Library/Application Support/deepj/`
//! - Windows: `%APPDATA%\deepj\`
//!
//! Every field is optional in the file:
//!
//! ```json
//! {
//!   "music_dir": "/srv/music/deepj",
//!   "history_size": 30,
//!   "detection_interval_secs": 1.0,
//!   "volume": 0.7,
//!   "device": "mpd"
//! }
//! ```

use crate::device::DEFAULT_VOLUME;
use crate::session::DEFAULT_VOLUME_STEP;
use crate::smoother::DEFAULT_HISTORY_SIZE;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which playback device a session drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Music Player Daemon through `mpc`.
    #[default]
    Mpd,
    /// No audio; tracks "play" for a fixed time. Good for trying things out.
    Simulated,
}

/// Returns the platform data directory for DeepJ, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let deepj_dir = data_dir.join("deepj");
    fs::create_dir_all(&deepj_dir).with_context(|| {
        format!(
            "Failed to create DeepJ data directory at {}. Please check file permissions.",
            deepj_dir.display()
        )
    })?;

    Ok(deepj_dir)
}

/// Default location of the config file. The file itself may not exist.
///
/// # Errors
///
/// Fails if the platform has no config directory.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine system config directory"))?;
    Ok(config_dir.join("deepj").join("config.json"))
}

/// Music root used when neither the config nor the command line names one.
fn default_music_dir() -> PathBuf {
    get_data_dir()
        .map(|dir| dir.join("music"))
        .unwrap_or_else(|_| PathBuf::from("music"))
}

/// Configuration for a DJ session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root holding one folder per mood.
    pub music_dir: PathBuf,
    /// Classifications kept for the plurality vote.
    pub history_size: usize,
    /// Minimum seconds between two classifier calls.
    pub detection_interval_secs: f64,
    /// Initial volume, `0.0..=1.0`.
    pub volume: f32,
    pub volume_step: f32,
    /// Sleep between ticks; useful when replaying a recorded label file.
    pub frame_interval_ms: u64,
    /// Classifier results below this confidence are ignored.
    pub min_confidence: Option<f32>,
    pub device: DeviceKind,
    /// MPD's `music_directory`; read from `mpd.conf` when unset.
    pub mpd_music_dir: Option<PathBuf>,
    /// Track length for the simulated device.
    pub simulated_track_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            music_dir: default_music_dir(),
            history_size: DEFAULT_HISTORY_SIZE,
            detection_interval_secs: 1.0,
            volume: DEFAULT_VOLUME,
            volume_step: DEFAULT_VOLUME_STEP,
            frame_interval_ms: 0,
            min_confidence: None,
            device: DeviceKind::default(),
            mpd_music_dir: None,
            simulated_track_secs: 180,
        }
    }
}

impl RuntimeConfig {
    /// Reads a config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, is not valid JSON, or holds invalid
    /// values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `explicit` if given, else the default config file if it exists,
    /// else the defaults.
    ///
    /// # Errors
    ///
    /// An explicit path that cannot be loaded is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match get_config_path() {
            Ok(path) if path.exists() => Self::from_file(&path),
            Ok(path) => {
                debug!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                debug!("{e}; using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Checks the values a file or flag could have broken.
    ///
    /// # Errors
    ///
    /// Describes the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.history_size == 0 {
            bail!("history_size must be at least 1");
        }
        if Duration::try_from_secs_f64(self.detection_interval_secs).is_err() {
            bail!(
                "detection_interval_secs must be a non-negative number of seconds, got {}",
                self.detection_interval_secs
            );
        }
        if !self.volume_step.is_finite() || self.volume_step <= 0.0 {
            bail!("volume_step must be positive, got {}", self.volume_step);
        }
        Ok(())
    }

    /// Values [`validate`](Self::validate) rejects saturate instead of
    /// panicking: negative or NaN becomes zero, too large becomes
    /// [`Duration::MAX`].
    #[must_use]
    pub fn detection_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.detection_interval_secs).unwrap_or_else(|_| {
            if self.detection_interval_secs > 0.0 {
                Duration::MAX
            } else {
                Duration::ZERO
            }
        })
    }

    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    #[must_use]
    pub fn simulated_track_length(&self) -> Duration {
        Duration::from_secs(self.simulated_track_secs)
    }

    /// Writes this configuration as pretty JSON, creating parent folders.
    ///
    /// # Errors
    ///
    /// Fails on any filesystem error.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.history_size, 30);
        assert_eq!(config.detection_interval(), Duration::from_secs(1));
        assert_eq!(config.volume, 0.7);
        assert_eq!(config.device, DeviceKind::Mpd);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"history_size": 10, "device": "simulated"}"#)?;

        let config = RuntimeConfig::from_file(&path)?;
        assert_eq!(config.history_size, 10);
        assert_eq!(config.device, DeviceKind::Simulated);
        assert_eq!(config.detection_interval_secs, 1.0);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.json");

        fs::write(&path, r#"{"history_size": 0}"#)?;
        assert!(RuntimeConfig::from_file(&path).is_err());

        fs::write(&path, r#"{"detection_interval_secs": -2.0}"#)?;
        assert!(RuntimeConfig::from_file(&path).is_err());

        fs::write(&path, r#"{"detection_interval_secs": 1e20}"#)?;
        assert!(RuntimeConfig::from_file(&path).is_err());

        let huge = RuntimeConfig {
            detection_interval_secs: 1e20,
            ..RuntimeConfig::default()
        };
        assert!(huge.validate().is_err());
        assert_eq!(huge.detection_interval(), Duration::MAX);

        fs::write(&path, "not json")?;
        assert!(RuntimeConfig::from_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(RuntimeConfig::load(Some(Path::new("/no/such/config.json"))).is_err());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested").join("config.json");
        let config = RuntimeConfig {
            music_dir: temp.path().join("music"),
            min_confidence: Some(0.4),
            ..RuntimeConfig::default()
        };
        config.save(&path)?;
        assert_eq!(RuntimeConfig::load(Some(&path))?, config);
        Ok(())
    }

    #[test]
    fn test_data_dir_is_named_deepj() {
        if let Ok(dir) = get_data_dir() {
            assert_eq!(dir.file_name().unwrap(), "deepj");
            assert!(dir.is_dir());
        }
    }
}
