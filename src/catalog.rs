//! # Track Catalog
//!
//! Where the music for each mood comes from. The playback policy only ever
//! asks one question, "which tracks suit this mood?", through
//! [`TrackCatalog::tracks_for`].
//!
//! ## Directory Layout
//!
//! [`DirectoryCatalog`] expects one sub-folder per mood under a music root:
//!
//! ```text
//! music/
//! ├── energetic/
//! ├── calm/
//! ├── melancholic/
//! └── intense/
//! ```
//!
//! Only files directly inside a mood folder are considered, and only these
//! formats: MP3, WAV, OGG, FLAC. Anything else (including the README that
//! [`setup_music_directory`] writes) is ignored.
//!
//! The folder is listed again on every query, so tracks dropped into a mood
//! folder while DeepJ is running are picked up the next time that mood needs
//! a track.

use crate::mood::Mood;
use anyhow::{Context, Result};
use log::{debug, info};
use path_absolutize::Absolutize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Identifier handed to the playback device. For [`DirectoryCatalog`] this
/// is the absolute path of the audio file.
pub type TrackId = String;

/// Audio file extensions the catalog accepts (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp3", "wav", "ogg", "flac"];

/// Read-only source of tracks per mood.
pub trait TrackCatalog {
    /// Tracks available for `mood`. An empty vector is a normal answer.
    fn tracks_for(&self, mood: Mood) -> Vec<TrackId>;

    /// Every mood with its tracks, in [`Mood::ALL`] order.
    fn all_tracks(&self) -> Vec<(Mood, Vec<TrackId>)> {
        Mood::ALL
            .into_iter()
            .map(|mood| (mood, self.tracks_for(mood)))
            .collect()
    }
}

impl<T: TrackCatalog + ?Sized> TrackCatalog for &T {
    fn tracks_for(&self, mood: Mood) -> Vec<TrackId> {
        (**self).tracks_for(mood)
    }
}

/// Returns true if `path` has one of the [`SUPPORTED_EXTENSIONS`].
#[must_use]
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Catalog backed by mood-named folders on disk.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    /// Opens the catalog at `root`, creating any missing mood folders.
    ///
    /// # Errors
    ///
    /// Fails if the root cannot be made absolute or a folder cannot be
    /// created.
    pub fn open(root: &Path) -> Result<Self> {
        let root = root
            .absolutize()
            .with_context(|| format!("Failed to resolve music directory {}", root.display()))?
            .into_owned();

        for mood in Mood::ALL {
            let mood_dir = root.join(mood.as_str());
            fs::create_dir_all(&mood_dir).with_context(|| {
                format!("Failed to create mood directory {}", mood_dir.display())
            })?;
        }

        debug!("Opened music catalog at {}", root.display());
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn mood_dir(&self, mood: Mood) -> PathBuf {
        self.root.join(mood.as_str())
    }
}

impl TrackCatalog for DirectoryCatalog {
    fn tracks_for(&self, mood: Mood) -> Vec<TrackId> {
        let mood_dir = self.mood_dir(mood);

        let entries = match fs::read_dir(&mood_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {e}", mood_dir.display());
                return Vec::new();
            }
        };

        let mut tracks: Vec<TrackId> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_supported_audio(path))
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        tracks.sort();
        tracks
    }
}

/// In-memory catalog, mostly for tests and benchmarks.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tracks: BTreeMap<Mood, Vec<TrackId>>,
}

impl StaticCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tracks` to `mood`.
    #[must_use]
    pub fn with_tracks<I, S>(mut self, mood: Mood, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TrackId>,
    {
        self.tracks
            .entry(mood)
            .or_default()
            .extend(tracks.into_iter().map(Into::into));
        self
    }
}

impl TrackCatalog for StaticCatalog {
    fn tracks_for(&self, mood: Mood) -> Vec<TrackId> {
        self.tracks.get(&mood).cloned().unwrap_or_default()
    }
}

fn readme_for(mood: Mood) -> String {
    let title = format!("Place {} music files here", mood.as_str().to_uppercase());
    let mut text = format!("{title}\n{}\n\nSuggested genres:\n", "=".repeat(40));
    for style in mood.suggested_styles() {
        text.push_str(&format!("- {style}\n"));
    }
    text.push_str("\nSupported formats: MP3, WAV, OGG, FLAC\n");
    text
}

/// Creates the mood folder structure under `root`, each with a README
/// describing what belongs there.
///
/// Existing folders and their audio files are left alone; READMEs are
/// rewritten.
///
/// # Returns
///
/// The mood folders, in [`Mood::ALL`] order.
///
/// # Errors
///
/// Returns an error if a folder or README cannot be written.
pub fn setup_music_directory(root: &Path) -> Result<Vec<PathBuf>> {
    let catalog = DirectoryCatalog::open(root)?;
    info!("Setting up music directory at {}", catalog.root().display());

    let mut created = Vec::with_capacity(Mood::ALL.len());
    for mood in Mood::ALL {
        let mood_dir = catalog.mood_dir(mood);
        let readme = mood_dir.join("README.txt");
        fs::write(&readme, readme_for(mood))
            .with_context(|| format!("Failed to write {}", readme.display()))?;
        created.push(mood_dir);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_audio(Path::new("a/b/song.mp3")));
        assert!(is_supported_audio(Path::new("song.FLAC")));
        assert!(is_supported_audio(Path::new("song.Ogg")));
        assert!(is_supported_audio(Path::new("song.wav")));
        assert!(!is_supported_audio(Path::new("song.m4a")));
        assert!(!is_supported_audio(Path::new("README.txt")));
        assert!(!is_supported_audio(Path::new("noextension")));
    }

    #[test]
    fn test_open_creates_mood_dirs() -> Result<()> {
        let temp = TempDir::new()?;
        let catalog = DirectoryCatalog::open(temp.path())?;
        for mood in Mood::ALL {
            assert!(catalog.mood_dir(mood).is_dir());
        }
        Ok(())
    }

    #[test]
    fn test_directory_catalog_filters_and_sorts() -> Result<()> {
        let temp = TempDir::new()?;
        let catalog = DirectoryCatalog::open(temp.path())?;
        let calm = catalog.mood_dir(Mood::Calm);

        fs::write(calm.join("b.ogg"), b"")?;
        fs::write(calm.join("a.mp3"), b"")?;
        fs::write(calm.join("cover.jpg"), b"")?;
        fs::write(calm.join("notes.txt"), b"")?;
        fs::create_dir(calm.join("nested.flac"))?;

        let tracks = catalog.tracks_for(Mood::Calm);
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].ends_with("a.mp3"));
        assert!(tracks[1].ends_with("b.ogg"));
        assert!(Path::new(&tracks[0]).is_absolute());

        assert!(catalog.tracks_for(Mood::Intense).is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_mood_dir_is_empty() -> Result<()> {
        let temp = TempDir::new()?;
        let catalog = DirectoryCatalog::open(temp.path())?;
        fs::remove_dir(catalog.mood_dir(Mood::Energetic))?;
        assert!(catalog.tracks_for(Mood::Energetic).is_empty());
        Ok(())
    }

    #[test]
    fn test_setup_writes_readmes() -> Result<()> {
        let temp = TempDir::new()?;
        let dirs = setup_music_directory(temp.path())?;
        assert_eq!(dirs.len(), 4);

        let readme = fs::read_to_string(temp.path().join("intense/README.txt"))?;
        assert!(readme.contains("INTENSE"));
        assert!(readme.contains("Metal"));
        assert!(readme.contains("MP3, WAV, OGG, FLAC"));

        // README is not a track.
        let catalog = DirectoryCatalog::open(temp.path())?;
        assert!(catalog.tracks_for(Mood::Intense).is_empty());
        Ok(())
    }

    #[test]
    fn test_static_catalog() {
        let catalog = StaticCatalog::new()
            .with_tracks(Mood::Calm, ["one", "two"])
            .with_tracks(Mood::Calm, ["three"]);
        assert_eq!(catalog.tracks_for(Mood::Calm), vec!["one", "two", "three"]);
        assert!(catalog.tracks_for(Mood::Intense).is_empty());

        let all = catalog.all_tracks();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].0, Mood::Calm);
    }
}
