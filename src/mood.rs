//! # Emotions and Moods
//!
//! Raw per-frame emotion labels and the four coarse moods that drive music
//! selection. Every table in this module is an exhaustive `match`, so adding
//! a variant forces every mapping to be revisited.
//!
//! ## Emotion → Mood
//!
//! | emotion  | mood        |
//! |----------|-------------|
//! | happy    | energetic   |
//! | surprise | energetic   |
//! | neutral  | calm        |
//! | fear     | calm        |
//! | disgust  | calm        |
//! | unknown  | calm        |
//! | sad      | melancholic |
//! | angry    | intense     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete emotion reported by the classifier for a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Neutral,
    Sad,
    Angry,
    Surprise,
    Fear,
    Disgust,
    /// No face, or a label the classifier produced that we do not know.
    Unknown,
}

impl EmotionLabel {
    /// Every label, in table order.
    pub const ALL: [EmotionLabel; 8] = [
        EmotionLabel::Happy,
        EmotionLabel::Neutral,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Surprise,
        EmotionLabel::Fear,
        EmotionLabel::Disgust,
        EmotionLabel::Unknown,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Neutral => "neutral",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Unknown => "unknown",
        }
    }

    /// Parses classifier output leniently.
    ///
    /// Case and surrounding whitespace are ignored, and a few spellings used
    /// by common facial-expression models (`surprised`, `angry`/`anger`,
    /// `happiness`) are accepted. Anything unrecognised becomes
    /// [`EmotionLabel::Unknown`] rather than an error, since an unknown label
    /// still has a well-defined mood.
    #[must_use]
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "happy" | "happiness" | "joy" => EmotionLabel::Happy,
            "neutral" => EmotionLabel::Neutral,
            "sad" | "sadness" => EmotionLabel::Sad,
            "angry" | "anger" => EmotionLabel::Angry,
            "surprise" | "surprised" => EmotionLabel::Surprise,
            "fear" | "fearful" | "scared" => EmotionLabel::Fear,
            "disgust" | "disgusted" => EmotionLabel::Disgust,
            _ => EmotionLabel::Unknown,
        }
    }

    /// The mood this emotion contributes to the smoothing window.
    #[must_use]
    pub const fn mood(self) -> Mood {
        match self {
            EmotionLabel::Happy | EmotionLabel::Surprise => Mood::Energetic,
            EmotionLabel::Neutral
            | EmotionLabel::Fear
            | EmotionLabel::Disgust
            | EmotionLabel::Unknown => Mood::Calm,
            EmotionLabel::Sad => Mood::Melancholic,
            EmotionLabel::Angry => Mood::Intense,
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

/// Coarse mood category used to pick music.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Energetic,
    #[default]
    Calm,
    Melancholic,
    Intense,
}

impl Mood {
    /// All moods, in the order their music folders are listed.
    pub const ALL: [Mood; 4] = [Mood::Energetic, Mood::Calm, Mood::Melancholic, Mood::Intense];

    /// Lowercase name, also used as the music sub-directory name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Melancholic => "melancholic",
            Mood::Intense => "intense",
        }
    }

    /// Display colour as `(r, g, b)`.
    ///
    /// energetic is yellow, calm light blue, melancholic light purple and
    /// intense orange.
    #[must_use]
    pub const fn color(self) -> (u8, u8, u8) {
        match self {
            Mood::Energetic => (255, 255, 0),
            Mood::Calm => (100, 200, 255),
            Mood::Melancholic => (100, 100, 255),
            Mood::Intense => (255, 100, 0),
        }
    }

    /// Music styles that suit this mood. Written into the README of each
    /// mood folder by `deepj setup`.
    #[must_use]
    pub const fn suggested_styles(self) -> &'static [&'static str] {
        match self {
            Mood::Energetic => &["Pop", "Electronic/EDM", "Dance", "Upbeat songs"],
            Mood::Calm => &["Ambient", "Classical", "Chill", "Acoustic"],
            Mood::Melancholic => &["Blues", "Sad songs", "Slow ballads", "Emotional music"],
            Mood::Intense => &["Rock", "Metal", "Intense/Dramatic", "High-energy music"],
        }
    }

    /// Index into [`Mood::ALL`]; handy for fixed-size tally arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Mood::Energetic => 0,
            Mood::Calm => 1,
            Mood::Melancholic => 2,
            Mood::Intense => 3,
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "energetic" => Ok(Mood::Energetic),
            "calm" => Ok(Mood::Calm),
            "melancholic" => Ok(Mood::Melancholic),
            "intense" => Ok(Mood::Intense),
            other => anyhow::bail!(
                "Unknown mood '{other}'. Use one of: energetic, calm, melancholic, intense"
            ),
        }
    }
}

impl From<EmotionLabel> for Mood {
    fn from(label: EmotionLabel) -> Self {
        label.mood()
    }
}
