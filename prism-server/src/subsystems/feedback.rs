//! Feedback recording and reporting.
//!
//! `record_feedback` order: validate → resolve record → append event → write the
//! record's feedback fields → fold preferences. A failure before the append leaves
//! no trace; a failure after it is surfaced and recoverable through replay.

use std::collections::BTreeMap;

use chrono::Utc;
use prism_core::models::PreferenceSummary;
use prism_core::{
    ContentFilter, ContentRecord, Dimension, FeedbackEvent, FeedbackType, NewFeedback,
    PrismConfig, PrismError, Result, Store,
};
use serde::Serialize;

use super::preferences;

/// Patterns listed in stats need more evidence than the scoring threshold.
const STATS_MIN_CONFIDENCE: f64 = 0.3;
const STATS_TOP_N: usize = 10;
const RATING_ONLY: &str = "rating_only";

// ============================================================================
// PUBLIC API
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackReceipt {
    pub event: FeedbackEvent,
    pub patterns_updated: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedPreference {
    pub key: String,
    #[serde(flatten)]
    pub summary: PreferenceSummary,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub feedback_by_type: BTreeMap<String, usize>,
    pub gold_posts: usize,
    pub top_authors: Vec<RankedPreference>,
    pub top_topics: Vec<RankedPreference>,
}

/// Record one feedback event and learn from it.
pub async fn record_feedback(
    store: &dyn Store,
    config: &PrismConfig,
    request: NewFeedback,
) -> Result<FeedbackReceipt> {
    request.validate()?;

    let record = store
        .get_content_record(&request.content_id)
        .await?
        .ok_or_else(|| {
            PrismError::NotFound(format!("content record '{}'", request.content_id))
        })?;

    let _learning = preferences::LEARNING_GATE.read().await;
    let event = request.into_event(Utc::now());
    store.append_feedback_event(&event).await?;
    store
        .update_content_feedback_fields(
            &event.content_id,
            event.rating,
            event.feedback_type == Some(FeedbackType::Gold),
            &event.notes,
            event.recorded_at,
        )
        .await?;

    let patterns_updated =
        preferences::apply_event(store, &config.learning, &record, &event).await?;

    tracing::info!(
        "Recorded feedback {} on '{}' (type={}, rating={}) → {} patterns",
        event.id,
        event.content_id,
        event.feedback_type.map_or("-", |t| t.as_str()),
        event.rating.map_or_else(|| "-".to_string(), |r| r.to_string()),
        patterns_updated
    );

    Ok(FeedbackReceipt {
        event,
        patterns_updated,
    })
}

/// Events for one record, oldest first.
pub async fn feedback_for(store: &dyn Store, content_id: &str) -> Result<Vec<FeedbackEvent>> {
    store.list_feedback_events(Some(content_id)).await
}

/// Gold-marked active records, most recently marked first.
pub async fn gold_records(store: &dyn Store) -> Result<Vec<ContentRecord>> {
    let filter = ContentFilter {
        gold_only: true,
        ..ContentFilter::active()
    };
    let mut records = store.query_content_records(&filter).await?;
    records.sort_by(|a, b| b.feedback_timestamp.cmp(&a.feedback_timestamp));
    Ok(records)
}

pub async fn feedback_stats(store: &dyn Store) -> Result<FeedbackStats> {
    let events = store.list_feedback_events(None).await?;

    let mut feedback_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for event in &events {
        let key = match (event.feedback_type, event.rating) {
            (Some(t), _) => t.as_str(),
            (None, Some(_)) => RATING_ONLY,
            (None, None) => continue,
        };
        *feedback_by_type.entry(key.to_string()).or_default() += 1;
    }

    let gold_posts = gold_records(store).await?.len();
    let patterns = store.list_preference_patterns().await?;

    let top = |dimension: Dimension| {
        let mut ranked: Vec<RankedPreference> = patterns
            .iter()
            .filter(|p| p.dimension == dimension && p.confidence > STATS_MIN_CONFIDENCE)
            .map(|p| RankedPreference {
                key: p.pattern_key.clone(),
                summary: PreferenceSummary::from(p),
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.summary
                .score
                .partial_cmp(&a.summary.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });
        ranked.truncate(STATS_TOP_N);
        ranked
    };

    Ok(FeedbackStats {
        total_feedback: events.len(),
        feedback_by_type,
        gold_posts,
        top_authors: top(Dimension::Author),
        top_topics: top(Dimension::Topic),
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
