//! # Mood Smoother
//!
//! Turns a noisy, per-frame stream of emotion labels into a mood that only
//! changes when the face in front of the camera has *consistently* changed.
//!
//! Two mechanisms do this:
//!
//! - **Rate limiting**: the classifier runs at most once per detection
//!   interval (1 s by default). Calls in between return the cached mood
//!   without touching the classifier.
//! - **Plurality vote**: the last N labels (30 by default) are kept in a ring
//!   buffer. The mood is the one most of them map to. On a tie, the tied
//!   mood seen most recently wins, so the result never depends on hash or
//!   iteration order.
//!
//! With N = 30 and a 1 s interval the mood has roughly 30 seconds of memory.
//!
//! A classifier failure (no face, low confidence, broken record) is not an
//! error here: the history and mood are left exactly as they were.

use crate::classifier::{ClassifierError, EmotionClassifier};
use crate::mood::{EmotionLabel, Mood};
use log::{debug, trace};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default smoothing window, in classifications.
pub const DEFAULT_HISTORY_SIZE: usize = 30;

/// Default minimum time between two classifier calls.
pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-capacity ring buffer of the most recent emotion labels.
#[derive(Debug, Clone)]
pub struct EmotionHistory {
    entries: VecDeque<EmotionLabel>,
    capacity: usize,
}

impl EmotionHistory {
    /// Creates an empty history. A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `label`, returning the entry evicted to make room, if any.
    pub fn push(&mut self, label: EmotionLabel) -> Option<EmotionLabel> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(label);
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = EmotionLabel> + '_ {
        self.entries.iter().copied()
    }

    /// The last `n` labels, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<EmotionLabel> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).copied().collect()
    }

    /// Number of entries mapping to each mood, indexed by [`Mood::index`].
    #[must_use]
    pub fn mood_counts(&self) -> [usize; 4] {
        let mut counts = [0usize; 4];
        for label in &self.entries {
            counts[label.mood().index()] += 1;
        }
        counts
    }

    /// Plurality vote over the mapped moods.
    ///
    /// Returns `None` for an empty history. Among moods sharing the highest
    /// count, the one whose latest occurrence is newest wins.
    #[must_use]
    pub fn plurality(&self) -> Option<Mood> {
        let mut counts = [0usize; 4];
        // 1-based position of the newest occurrence; 0 means never seen.
        let mut last_seen = [0usize; 4];

        for (position, label) in self.entries.iter().enumerate() {
            let slot = label.mood().index();
            counts[slot] += 1;
            last_seen[slot] = position + 1;
        }

        trace!("Mood tally {counts:?} over {} entries", self.entries.len());

        Mood::ALL
            .into_iter()
            .filter(|mood| counts[mood.index()] > 0)
            .max_by_key(|mood| (counts[mood.index()], last_seen[mood.index()]))
    }
}

/// Smoother state other than the history itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodState {
    pub current_mood: Mood,
    /// `None` until the first classification attempt.
    pub last_detection: Option<Instant>,
    pub detection_interval: Duration,
}

impl Default for MoodState {
    fn default() -> Self {
        Self {
            current_mood: Mood::default(),
            last_detection: None,
            detection_interval: DEFAULT_DETECTION_INTERVAL,
        }
    }
}

/// What a single [`MoodSmoother::update_detailed`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Inside the detection interval; classifier not called.
    RateLimited,
    /// Classifier called but gave nothing usable.
    Missed(ClassifierError),
    /// Classifier produced a label, which was added to the history.
    Classified(EmotionLabel),
}

/// Result of an update: the (possibly unchanged) mood and how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub mood: Mood,
    pub detection: Detection,
}

/// Rate-limited, majority-filtered mood tracker.
#[derive(Debug)]
pub struct MoodSmoother<C> {
    classifier: C,
    history: EmotionHistory,
    state: MoodState,
}

impl<C: EmotionClassifier> MoodSmoother<C> {
    pub fn new(classifier: C, history_size: usize, detection_interval: Duration) -> Self {
        Self {
            classifier,
            history: EmotionHistory::new(history_size),
            state: MoodState {
                detection_interval,
                ..MoodState::default()
            },
        }
    }

    /// Smoother with a 30-entry window and a one second interval.
    pub fn with_defaults(classifier: C) -> Self {
        Self::new(classifier, DEFAULT_HISTORY_SIZE, DEFAULT_DETECTION_INTERVAL)
    }

    /// Feeds one frame observed at `now` and returns the current mood.
    pub fn update(&mut self, frame: &C::Frame, now: Instant) -> Mood {
        self.update_detailed(frame, now).mood
    }

    /// Same as [`update`](Self::update), but also reports whether the
    /// classifier ran and what it said.
    pub fn update_detailed(&mut self, frame: &C::Frame, now: Instant) -> UpdateOutcome {
        if let Some(last) = self.state.last_detection {
            if now.saturating_duration_since(last) < self.state.detection_interval {
                return UpdateOutcome {
                    mood: self.state.current_mood,
                    detection: Detection::RateLimited,
                };
            }
        }

        self.state.last_detection = Some(now);

        let label = match self.classifier.classify(frame) {
            Ok(result) if result.label != EmotionLabel::Unknown => result.label,
            Ok(_) => {
                debug!("Classifier returned no usable emotion; keeping {}", self.state.current_mood);
                return UpdateOutcome {
                    mood: self.state.current_mood,
                    detection: Detection::Missed(ClassifierError::NoFace),
                };
            }
            Err(e) => {
                debug!("No emotion this cycle ({e}); keeping {}", self.state.current_mood);
                return UpdateOutcome {
                    mood: self.state.current_mood,
                    detection: Detection::Missed(e),
                };
            }
        };

        self.history.push(label);
        if let Some(mood) = self.history.plurality() {
            self.state.current_mood = mood;
        }

        UpdateOutcome {
            mood: self.state.current_mood,
            detection: Detection::Classified(label),
        }
    }

    /// Clears the history and returns to `calm`.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state.current_mood = Mood::default();
        self.state.last_detection = None;
    }

    #[must_use]
    pub fn current_mood(&self) -> Mood {
        self.state.current_mood
    }

    #[must_use]
    pub fn state(&self) -> &MoodState {
        &self.state
    }

    #[must_use]
    pub fn history(&self) -> &EmotionHistory {
        &self.history
    }

    pub fn set_detection_interval(&mut self, interval: Duration) {
        self.state.detection_interval = interval;
    }

    pub fn classifier_mut(&mut self) -> &mut C {
        &mut self.classifier
    }
}
