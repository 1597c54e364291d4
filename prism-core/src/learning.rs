//! Preference aggregation
//!
//! Feedback → signed increment → exponential moving average per (dimension, key):
//!
//!   score'      = α × signal + (1 − α) × score          (α = learning_rate, default 0.3)
//!   sample'     = sample + 1
//!   confidence' = min(max_confidence, sample' × step)   (step 0.1, cap 0.95)
//!
//! A new pattern starts at `{score: signal, confidence: initial_confidence, sample: 1}`.
//! Everything here is pure; storage atomicity is the store's job.

use chrono::{DateTime, Utc};

use crate::config::LearningConfig;
use crate::models::{ContentRecord, Dimension, FeedbackType, PreferencePattern};

/// Fixed signal table for explicit feedback types.
pub fn feedback_signal(feedback_type: FeedbackType) -> f64 {
    match feedback_type {
        FeedbackType::Gold => 1.0,
        FeedbackType::Good => 0.6,
        FeedbackType::Poor => -0.4,
        FeedbackType::Irrelevant => -0.8,
    }
}

/// Convert feedback into a preference increment in [-1, 1].
///
/// The feedback type wins over the rating. A rating alone maps 1..=5 onto -1..=1;
/// out-of-range ratings are clamped first. No signal at all yields 0.0.
pub fn to_score(feedback_type: Option<FeedbackType>, rating: Option<i32>) -> f64 {
    match (feedback_type, rating) {
        (Some(ft), _) => feedback_signal(ft),
        (None, Some(r)) => (f64::from(r.clamp(1, 5)) - 3.0) / 2.0,
        (None, None) => 0.0,
    }
}

/// Confidence reached after `sample_size` contributing events.
pub fn confidence_for(sample_size: u32, config: &LearningConfig) -> f64 {
    if sample_size <= 1 {
        return config.initial_confidence.min(config.max_confidence);
    }
    (f64::from(sample_size) * config.confidence_step).min(config.max_confidence)
}

/// Fold one signal into an existing pattern, or start a new one.
pub fn fold(
    existing: Option<&PreferencePattern>,
    dimension: Dimension,
    key: &str,
    signal: f64,
    now: DateTime<Utc>,
    config: &LearningConfig,
) -> PreferencePattern {
    let signal = signal.clamp(-1.0, 1.0);
    match existing {
        None => PreferencePattern {
            dimension,
            pattern_key: key.to_string(),
            preference_score: signal,
            confidence: confidence_for(1, config),
            sample_size: 1,
            last_updated: now,
        },
        Some(prev) => {
            let alpha = config.learning_rate;
            let sample_size = prev.sample_size.saturating_add(1);
            PreferencePattern {
                dimension,
                pattern_key: key.to_string(),
                preference_score: (alpha * signal + (1.0 - alpha) * prev.preference_score)
                    .clamp(-1.0, 1.0),
                confidence: confidence_for(sample_size, config).max(prev.confidence),
                sample_size,
                last_updated: now.max(prev.last_updated),
            }
        }
    }
}

/// Every (dimension, key) a feedback event on `record` contributes to.
///
/// Blank values are skipped; tags are de-duplicated so each key is folded once per event.
pub fn touched_keys(record: &ContentRecord) -> Vec<(Dimension, String)> {
    let mut keys = Vec::new();
    if let Some(author) = record.author_key() {
        keys.push((Dimension::Author, author.to_string()));
    }
    if let Some(topic) = record.topic_key() {
        keys.push((Dimension::Topic, topic.to_string()));
    }
    if let Some(content_type) = record.content_type_key() {
        keys.push((Dimension::ContentType, content_type.to_string()));
    }
    for tag in record.tag_keys() {
        keys.push((Dimension::Tag, tag.to_string()));
    }
    keys
}
