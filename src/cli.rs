//! # Command-Line Interface Module
//!
//! Defines the DeepJ command line using Clap derive macros.
//!
//! ## Commands
//!
//! - `run`: Watch the listener's mood and play matching music
//! - `setup`: Create the mood folder structure
//! - `tracks`: List the tracks found for each mood
//! - `moods`: Show which emotions map to which mood
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! deepj setup ~/Music/deepj
//! deepj run --classifier-cmd "python3 detect.py" --music-dir ~/Music/deepj
//! deepj run --frames session.log --device simulated --seed 7
//! ```

use crate::config::DeviceKind;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "deepj")]
#[command(about = "DeepJ: a DJ that plays music to match the mood on your face")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the DJ loop
    ///
    /// Reads one frame per line (an emotion label, optionally followed by a
    /// confidence, or a JSON object with `dominant_emotion`), smooths the
    /// detections into a mood and keeps music from that mood's folder
    /// playing.
    ///
    /// When stdin is not the frame source it accepts controls, one per line:
    /// `p` pause/resume, `+`/`-` volume, `q` quit.
    Run {
        /// File of recorded frames, or `-` for stdin
        ///
        /// Defaults to stdin when no classifier command is given.
        #[arg(long, value_name = "PATH", conflicts_with = "classifier_cmd")]
        frames: Option<PathBuf>,

        /// Shell command printing one classification per line
        #[arg(long, value_name = "CMD")]
        classifier_cmd: Option<String>,

        /// Root directory holding one folder per mood
        #[arg(long, value_name = "DIR")]
        music_dir: Option<PathBuf>,

        /// Number of classifications in the smoothing window
        #[arg(long, value_name = "N")]
        history_size: Option<usize>,

        /// Minimum seconds between classifier calls
        #[arg(long, value_name = "SECS")]
        interval: Option<f64>,

        /// Initial volume between 0.0 and 1.0
        #[arg(long)]
        volume: Option<f32>,

        /// Ignore classifications below this confidence
        #[arg(long, value_name = "CONF")]
        min_confidence: Option<f32>,

        /// Playback device
        #[arg(long, value_enum)]
        device: Option<DeviceKind>,

        /// Seed for track selection, for reproducible runs
        #[arg(long, value_name = "N")]
        seed: Option<u64>,

        /// Config file to use instead of the default location
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print the session summary as JSON when done
        #[arg(long)]
        json: bool,
    },

    /// Create the mood folders with a README in each
    ///
    /// Uses the configured music directory when DIR is omitted.
    Setup {
        /// Root directory to set up
        dir: Option<PathBuf>,

        /// Also write a config file pointing at this music directory
        #[arg(long)]
        save_config: bool,

        /// Config file to read and write instead of the default location
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// List the playable tracks for each mood
    Tracks {
        /// Root directory to scan
        dir: Option<PathBuf>,
    },

    /// Show the emotion to mood mapping
    Moods,

    /// Generate shell completions
    ///
    /// Outputs completion script for the specified shell to stdout.
    /// Redirect to the appropriate completion directory for your shell.
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "deepj",
            "run",
            "--frames",
            "session.log",
            "--device",
            "simulated",
            "--history-size",
            "12",
            "--seed",
            "3",
        ])
        .unwrap();

        match args.command {
            Command::Run {
                frames,
                device,
                history_size,
                seed,
                classifier_cmd,
                ..
            } => {
                assert_eq!(frames, Some(PathBuf::from("session.log")));
                assert_eq!(device, Some(DeviceKind::Simulated));
                assert_eq!(history_size, Some(12));
                assert_eq!(seed, Some(3));
                assert_eq!(classifier_cmd, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_frames_conflicts_with_classifier_cmd() {
        let result = Args::try_parse_from([
            "deepj",
            "run",
            "--frames",
            "a.log",
            "--classifier-cmd",
            "detect",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_setup_save_config() {
        let args =
            Args::try_parse_from(["deepj", "setup", "music", "--save-config", "--config", "c.json"])
                .unwrap();
        match args.command {
            Command::Setup {
                dir,
                save_config,
                config,
            } => {
                assert_eq!(dir, Some(PathBuf::from("music")));
                assert!(save_config);
                assert_eq!(config, Some(PathBuf::from("c.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_completion() {
        let args = Args::try_parse_from(["deepj", "completion", "power-shell"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Completion {
                shell: Shell::PowerShell
            }
        ));
    }
}
