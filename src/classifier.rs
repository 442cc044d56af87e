//! # Emotion Classifier Boundary
//!
//! The facial-expression model itself lives outside this crate. What the
//! smoother needs is a function from a frame to an [`EmotionLabel`] that is
//! allowed to fail; [`EmotionClassifier`] is that seam.
//!
//! [`LabelClassifier`] is the adapter used by the `deepj` binary: an external
//! process (for example a small face-analysis script) writes one record per
//! analysed camera frame, and each record is a "frame" here. Records may be
//! a bare label, a label followed by a confidence, or a JSON object:
//!
//! ```text
//! happy
//! sad 0.71
//! {"dominant_emotion": "angry", "confidence": 93.5}
//! none
//! ```

use crate::mood::EmotionLabel;
use serde::Deserialize;
use thiserror::Error;

/// Successful classification of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: EmotionLabel,
    /// Confidence in `[0, 1]` when the classifier reports one.
    pub confidence: Option<f32>,
}

impl Classification {
    #[must_use]
    pub const fn new(label: EmotionLabel) -> Self {
        Self { label, confidence: None }
    }
}

/// Reasons a frame produced no usable emotion.
///
/// None of these are fatal; the smoother treats every variant as "no update".
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("no face detected in frame")]
    NoFace,
    #[error("classifier confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence { confidence: f32, threshold: f32 },
    #[error("malformed classifier record: {0}")]
    Malformed(String),
    #[error("classifier failed: {0}")]
    Failed(String),
}

/// Something that turns a frame into an emotion label.
pub trait EmotionClassifier {
    type Frame;

    /// Classifies a single frame. May block.
    fn classify(&mut self, frame: &Self::Frame) -> Result<Classification, ClassifierError>;
}

impl<C: EmotionClassifier + ?Sized> EmotionClassifier for Box<C> {
    type Frame = C::Frame;

    fn classify(&mut self, frame: &Self::Frame) -> Result<Classification, ClassifierError> {
        (**self).classify(frame)
    }
}

#[derive(Debug, Deserialize)]
struct JsonRecord {
    #[serde(alias = "emotion", alias = "label")]
    dominant_emotion: Option<String>,
    confidence: Option<f32>,
}

/// Classifier for text records emitted by an external emotion model.
#[derive(Debug, Clone, Default)]
pub struct LabelClassifier {
    min_confidence: Option<f32>,
}

impl LabelClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects results whose reported confidence is below `threshold`.
    /// Records without a confidence are always accepted.
    #[must_use]
    pub fn with_min_confidence(mut self, threshold: f32) -> Self {
        self.min_confidence = Some(threshold.clamp(0.0, 1.0));
        self
    }

    fn parse_record(record: &str) -> Result<(String, Option<f32>), ClassifierError> {
        let record = record.trim();

        if record.starts_with('{') {
            let parsed: JsonRecord = serde_json::from_str(record)
                .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
            let label = parsed.dominant_emotion.ok_or(ClassifierError::NoFace)?;
            return Ok((label, check_confidence(parsed.confidence)?));
        }

        let mut parts = record.split_whitespace();
        let label = parts.next().ok_or(ClassifierError::NoFace)?.to_string();
        let confidence = match parts.next() {
            Some(raw) => Some(
                raw.parse::<f32>()
                    .map_err(|_| ClassifierError::Malformed(format!("bad confidence '{raw}'")))?,
            ),
            None => None,
        };
        Ok((label, check_confidence(confidence)?))
    }
}

/// NaN and infinities would slip past any threshold comparison.
fn check_confidence(confidence: Option<f32>) -> Result<Option<f32>, ClassifierError> {
    match confidence {
        Some(value) if !value.is_finite() => Err(ClassifierError::Malformed(format!(
            "confidence must be a finite number, got {value}"
        ))),
        other => Ok(other),
    }
}

/// Classifiers such as DeepFace report percentages; fold them into `[0, 1]`.
fn normalize_confidence(raw: f32) -> f32 {
    let value = if raw > 1.0 { raw / 100.0 } else { raw };
    value.clamp(0.0, 1.0)
}

impl EmotionClassifier for LabelClassifier {
    type Frame = String;

    fn classify(&mut self, frame: &String) -> Result<Classification, ClassifierError> {
        let (raw_label, raw_confidence) = Self::parse_record(frame)?;

        if matches!(
            raw_label.to_ascii_lowercase().as_str(),
            "none" | "no_face" | "noface" | "-"
        ) {
            return Err(ClassifierError::NoFace);
        }

        let label = EmotionLabel::parse_lenient(&raw_label);
        if label == EmotionLabel::Unknown {
            return Err(ClassifierError::NoFace);
        }

        let confidence = raw_confidence.map(normalize_confidence);
        if let (Some(confidence), Some(threshold)) = (confidence, self.min_confidence) {
            if confidence < threshold {
                return Err(ClassifierError::LowConfidence { confidence, threshold });
            }
        }

        Ok(Classification { label, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(record: &str) -> Result<Classification, ClassifierError> {
        LabelClassifier::new().classify(&record.to_string())
    }

    #[test]
    fn test_bare_label() {
        let result = classify("happy").unwrap();
        assert_eq!(result.label, EmotionLabel::Happy);
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn test_label_with_confidence() {
        let result = classify("sad 0.71").unwrap();
        assert_eq!(result.label, EmotionLabel::Sad);
        assert_eq!(result.confidence, Some(0.71));
    }

    #[test]
    fn test_json_record_with_percentage() {
        let result = classify(r#"{"dominant_emotion": "angry", "confidence": 93.5}"#).unwrap();
        assert_eq!(result.label, EmotionLabel::Angry);
        let confidence = result.confidence.unwrap();
        assert!((confidence - 0.935).abs() < 1e-6);
    }

    #[test]
    fn test_json_alias_fields() {
        let result = classify(r#"{"emotion": "surprise"}"#).unwrap();
        assert_eq!(result.label, EmotionLabel::Surprise);
    }

    #[test]
    fn test_no_signal_records() {
        assert_eq!(classify(""), Err(ClassifierError::NoFace));
        assert_eq!(classify("   "), Err(ClassifierError::NoFace));
        assert_eq!(classify("none"), Err(ClassifierError::NoFace));
        assert_eq!(classify("unknown"), Err(ClassifierError::NoFace));
        assert_eq!(classify("{}"), Err(ClassifierError::NoFace));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(classify("happy lots"), Err(ClassifierError::Malformed(_))));
        assert!(matches!(classify("{not json"), Err(ClassifierError::Malformed(_))));
    }

    #[test]
    fn test_min_confidence() {
        let mut classifier = LabelClassifier::new().with_min_confidence(0.5);
        assert!(matches!(
            classifier.classify(&"happy 0.2".to_string()),
            Err(ClassifierError::LowConfidence { .. })
        ));
        assert!(classifier.classify(&"happy 0.9".to_string()).is_ok());
        // No confidence reported: accepted.
        assert!(classifier.classify(&"happy".to_string()).is_ok());
    }

    #[test]
    fn test_non_finite_confidence_is_malformed() {
        let mut classifier = LabelClassifier::new().with_min_confidence(0.5);
        for record in ["happy NaN", "happy inf", "sad -inf"] {
            assert!(
                matches!(
                    classifier.classify(&record.to_string()),
                    Err(ClassifierError::Malformed(_))
                ),
                "{record} should be rejected"
            );
        }
        assert!(matches!(classify("happy NaN"), Err(ClassifierError::Malformed(_))));
    }
}
