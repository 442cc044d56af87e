//! # DeepJ - Mood-Driven DJ
//!
//! DeepJ watches the listener's facial expression and keeps music playing
//! that matches their mood. Single-frame emotion detections are noisy, so
//! they are smoothed over a window before the music is allowed to change.
//!
//! ## Architecture
//!
//! - `mood`: Emotion labels, moods, and the mapping between them
//! - `classifier`: The emotion classifier interface and a text-based classifier
//! - `smoother`: Rate-limited detection with a plurality vote over recent labels
//! - `catalog`: Mood folders on disk and the tracks in them
//! - `policy`: Decides whether a new track should start
//! - `device`: Playback device interface, player state, simulated device
//! - `mpd`: Playback through Music Player Daemon via `mpc`
//! - `frames`: Frame sources (files, stdin, classifier processes)
//! - `session`: The application loop
//! - `config`: Configuration and data directory management
//! - `cli` / `completion`: Command line and shell completions
//!
//! ## Usage
//!
//! ```bash
//! # Create the mood folders, then drop music into them
//! deepj setup ~/Music/deepj
//!
//! # Run with a classifier that prints one label per line
//! deepj run --classifier-cmd "python3 detect.py" --music-dir ~/Music/deepj
//! ```

pub mod catalog;
pub mod classifier;
pub mod cli;
pub mod completion;
pub mod config;
pub mod device;
pub mod frames;
pub mod mood;
pub mod mpd;
pub mod policy;
pub mod session;
pub mod smoother;
