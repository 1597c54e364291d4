//! Score adjustment from known preferences.
//!
//! adj = Σ weight_d × score_d × confidence_d over author, topic and content type,
//!     + tag_weight × mean(score × confidence over known tags)
//! clamped to ±max_adjustment. Only patterns above the confidence threshold count.

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::models::{ContentRecord, Dimension, UserPreferences};

/// Bounded additive adjustment for `record` given the current known preferences.
pub fn adjustment_for(record: &ContentRecord, prefs: &UserPreferences, config: &ScoringConfig) -> f64 {
    let mut adjustment = 0.0;

    let weighted = [
        (Dimension::Author, record.author_key(), config.author_weight),
        (Dimension::Topic, record.topic_key(), config.topic_weight),
        (Dimension::ContentType, record.content_type_key(), config.content_type_weight),
    ];
    for (dimension, key, weight) in weighted {
        if let Some(pref) = key.and_then(|k| prefs.get(dimension, k)) {
            adjustment += pref.weighted() * weight;
        }
    }

    let tag_terms: Vec<f64> = record
        .tag_keys()
        .into_iter()
        .filter_map(|tag| prefs.get(Dimension::Tag, tag))
        .map(|pref| pref.weighted())
        .collect();
    if !tag_terms.is_empty() {
        let mean = tag_terms.iter().sum::<f64>() / tag_terms.len() as f64;
        adjustment += mean * config.tag_weight;
    }

    clamp_adjustment(adjustment, config.max_adjustment)
}

fn clamp_adjustment(value: f64, bound: f64) -> f64 {
    if value.is_nan() || bound.is_nan() {
        return 0.0;
    }
    let bound = bound.abs();
    value.clamp(-bound, bound)
}

/// A record ranked by its preference-adjusted score.
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub base_value_score: f64,
    pub adjustment: f64,
    pub final_score: f64,
}

/// Rank records by `clamp(base + adjustment, 0, 10)`, highest first.
pub fn rank(
    records: &[ContentRecord],
    prefs: &UserPreferences,
    config: &ScoringConfig,
    limit: usize,
) -> Vec<Recommendation> {
    let mut ranked: Vec<Recommendation> = records
        .iter()
        .map(|record| {
            let adjustment = adjustment_for(record, prefs, config);
            Recommendation {
                id: record.id.clone(),
                title: record.display_title(),
                author: record.author.clone(),
                base_value_score: record.base_value_score,
                adjustment,
                final_score: (record.base_value_score + adjustment).clamp(0.0, 10.0),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    ranked.truncate(limit);
    ranked
}
