//! # DeepJ command-line entry point
//!
//! Logging is controlled via `RUST_LOG`:
//! - `RUST_LOG=info deepj run ...` - Mood changes and track starts
//! - `RUST_LOG=deepj::smoother=trace deepj run ...` - Every vote tally

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use deepj::catalog::{self, DirectoryCatalog, TrackCatalog};
use deepj::classifier::LabelClassifier;
use deepj::cli::{self, Command};
use deepj::completion;
use deepj::config::{get_config_path, DeviceKind, RuntimeConfig};
use deepj::device::{PlaybackDevice, Player, SimulatedDevice};
use deepj::frames::LineFrameSource;
use deepj::mood::{EmotionLabel, Mood};
use deepj::mpd::MpdDevice;
use deepj::session::{Control, Session, SessionOptions, SessionSummary};
use deepj::smoother::MoodSmoother;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

/// Options of the `run` command, gathered so they can be merged into the
/// loaded configuration.
struct RunOptions {
    frames: Option<PathBuf>,
    classifier_cmd: Option<String>,
    music_dir: Option<PathBuf>,
    history_size: Option<usize>,
    interval: Option<f64>,
    volume: Option<f32>,
    min_confidence: Option<f32>,
    device: Option<DeviceKind>,
    seed: Option<u64>,
    config: Option<PathBuf>,
    json: bool,
}

impl RunOptions {
    /// Command-line flags win over the config file.
    fn apply_to(&self, config: &mut RuntimeConfig) {
        if let Some(dir) = &self.music_dir {
            config.music_dir = dir.clone();
        }
        if let Some(size) = self.history_size {
            config.history_size = size;
        }
        if let Some(interval) = self.interval {
            config.detection_interval_secs = interval;
        }
        if let Some(volume) = self.volume {
            config.volume = volume;
        }
        if let Some(threshold) = self.min_confidence {
            config.min_confidence = Some(threshold);
        }
        if let Some(device) = self.device {
            config.device = device;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        Command::Run {
            frames,
            classifier_cmd,
            music_dir,
            history_size,
            interval,
            volume,
            min_confidence,
            device,
            seed,
            config,
            json,
        } => run(RunOptions {
            frames,
            classifier_cmd,
            music_dir,
            history_size,
            interval,
            volume,
            min_confidence,
            device,
            seed,
            config,
            json,
        })?,
        Command::Setup {
            dir,
            save_config,
            config,
        } => setup(dir, save_config, config)?,
        Command::Tracks { dir } => list_tracks(dir)?,
        Command::Moods => print_moods(),
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
    }

    Ok(())
}

/// Music root from the command line, else from the configuration.
fn resolve_music_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => Ok(RuntimeConfig::load(None)?.music_dir),
    }
}

fn open_device(config: &RuntimeConfig, catalog: &DirectoryCatalog) -> Result<Box<dyn PlaybackDevice>> {
    match config.device {
        DeviceKind::Mpd => {
            let device = MpdDevice::connect(config.mpd_music_dir.clone()).map_err(|e| {
                eprintln!("Failed to connect to MPD:");
                eprintln!("  {e:#}");
                eprintln!();
                eprintln!("To fix this:");
                eprintln!("  1. Start MPD: systemctl --user start mpd");
                eprintln!("  2. Install the mpc client");
                eprintln!("  3. Or try DeepJ without audio: deepj run --device simulated");
                e
            })?;
            if !catalog.root().starts_with(device.music_dir()) {
                warn!(
                    "Music directory {} is outside MPD's music directory {}; tracks will fail to load",
                    catalog.root().display(),
                    device.music_dir().display()
                );
            }
            Ok(Box::new(device))
        }
        DeviceKind::Simulated => {
            info!(
                "Using simulated playback ({}s per track)",
                config.simulated_track_secs
            );
            Ok(Box::new(SimulatedDevice::new(config.simulated_track_length())))
        }
    }
}

/// Reads control commands from stdin on a background thread.
fn spawn_control_reader() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Control::parse(&line) {
                Some(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                None => debug!("Ignoring unknown control: {line:?}"),
            }
        }
    });
    rx
}

fn run(options: RunOptions) -> Result<()> {
    let mut config = RuntimeConfig::load(options.config.as_deref())?;
    options.apply_to(&mut config);
    config.validate()?;

    let mut classifier = LabelClassifier::new();
    if let Some(threshold) = config.min_confidence {
        classifier = classifier.with_min_confidence(threshold);
    }
    let smoother = MoodSmoother::new(classifier, config.history_size, config.detection_interval());

    let catalog = DirectoryCatalog::open(&config.music_dir)?;
    let total: usize = catalog.all_tracks().iter().map(|(_, tracks)| tracks.len()).sum();
    info!("Music directory {} holds {total} tracks", catalog.root().display());

    let device = open_device(&config, &catalog)?;
    let player = Player::new(device, config.volume);

    let rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (frames, stdin_is_frames) = match (&options.classifier_cmd, &options.frames) {
        (Some(cmd), _) => (LineFrameSource::spawn(cmd)?, false),
        (None, Some(path)) => (LineFrameSource::open(path)?, path.as_os_str() == "-"),
        (None, None) => (LineFrameSource::open(Path::new("-"))?, true),
    };

    let session_options = SessionOptions {
        volume_step: config.volume_step,
        frame_interval: config.frame_interval(),
    };
    let mut session = Session::new(frames, smoother, player, catalog, rng).with_options(session_options);
    if stdin_is_frames {
        debug!("stdin carries frames; keyboard controls are disabled");
    } else {
        eprintln!("Controls: p = pause/resume, + / - = volume, q = quit (then Enter)");
        session = session.with_controls(spawn_control_reader());
    }

    let summary = session.run()?;
    print_summary(&summary, options.json)
}

fn print_summary(summary: &SessionSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!();
    println!("Session summary");
    println!("  Ticks:             {}", summary.ticks);
    println!("  Classifications:   {}", summary.classifications);
    println!("  Missed detections: {}", summary.missed_detections);
    println!("  Mood changes:      {}", summary.mood_changes);
    println!("  Tracks started:    {}", summary.tracks_started);
    println!("  Playback failures: {}", summary.play_failures);
    println!("  Final mood:        {}", summary.final_mood);
    Ok(())
}

fn setup(dir: Option<PathBuf>, save_config: bool, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = match &config_path {
        Some(path) if path.exists() => RuntimeConfig::from_file(path)?,
        Some(_) => RuntimeConfig::default(),
        None => RuntimeConfig::load(None)?,
    };
    let root = dir.unwrap_or_else(|| config.music_dir.clone());
    let folders = catalog::setup_music_directory(&root)?;

    println!("Music directory ready:");
    for (mood, folder) in Mood::ALL.iter().zip(&folders) {
        println!("  {:<12} {}", mood.as_str(), folder.display());
    }
    println!();
    println!(
        "Add {} files to each folder.",
        catalog::SUPPORTED_EXTENSIONS.join("/")
    );

    if save_config {
        config.music_dir = DirectoryCatalog::open(&root)?.root().to_path_buf();
        let path = match config_path {
            Some(path) => path,
            None => get_config_path()?,
        };
        config
            .save(&path)
            .with_context(|| format!("Failed to save configuration to {}", path.display()))?;
        println!("Configuration saved to {}", path.display());
    }
    Ok(())
}

fn list_tracks(dir: Option<PathBuf>) -> Result<()> {
    let root = resolve_music_dir(dir)?;
    let catalog = DirectoryCatalog::open(&root)?;

    println!("Tracks in {}:", catalog.root().display());
    for (mood, tracks) in catalog.all_tracks() {
        println!();
        println!("{} ({})", mood.as_str(), tracks.len());
        if tracks.is_empty() {
            println!("  (none)");
        }
        for track in &tracks {
            let name = Path::new(track)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| track.clone());
            println!("  {name}");
        }
    }
    Ok(())
}

fn print_moods() {
    println!("{:<10} → MOOD", "EMOTION");
    for label in EmotionLabel::ALL {
        println!("{:<10} → {}", label.as_str(), label.mood());
    }
    println!();
    for mood in Mood::ALL {
        let (r, g, b) = mood.color();
        println!(
            "{:<12} #{r:02x}{g:02x}{b:02x}  {}",
            mood.as_str(),
            mood.suggested_styles().join(", ")
        );
    }
}
