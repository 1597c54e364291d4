//! Preference aggregation over the feedback log.
//!
//! Each feedback event folds its signal into one pattern per touched key
//! (author, topic, content type, each distinct tag):
//!
//!   score' = α × signal + (1 − α) × score        α = learning_rate (0.3)
//!   n'     = n + 1
//!   conf'  = min(max_confidence, n' × confidence_step)
//!
//! Folds are stamped with the event's `recorded_at`, so replaying the log in order
//! reproduces the live state exactly.
//!
//! Live feedback holds `LEARNING_GATE` shared from append to fold; replay holds it
//! exclusively. The gate is per process: replaying while another process records
//! feedback against the same database is unsupported (use `prism-server --replay`
//! with the service stopped).

use prism_core::config::{LearningConfig, ScoringConfig};
use prism_core::learning;
use prism_core::models::UserPreferences;
use prism_core::scoring::{self, Recommendation};
use prism_core::{
    ContentFilter, ContentRecord, FeedbackEvent, PreferencePattern, PrismConfig, PrismError,
    Result, Store,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::RwLock;

/// Serializes replay against in-flight feedback so no event is folded twice.
pub(crate) static LEARNING_GATE: Lazy<RwLock<()>> = Lazy::new(|| RwLock::new(()));

// ============================================================================
// PUBLIC API
// ============================================================================

/// Report from a full replay of the feedback log.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ReplayReport {
    pub events_replayed: usize,
    /// Events whose content record no longer exists.
    pub events_skipped: usize,
    /// Total pattern folds applied.
    pub patterns_updated: usize,
}

/// Fold one event into every pattern it touches. Returns the number of folds.
pub async fn apply_event(
    store: &dyn Store,
    config: &LearningConfig,
    record: &ContentRecord,
    event: &FeedbackEvent,
) -> Result<usize> {
    let signal = learning::to_score(event.feedback_type, event.rating);
    let keys = learning::touched_keys(record);

    for (dimension, key) in &keys {
        let fold = |existing: Option<&PreferencePattern>| {
            learning::fold(existing, *dimension, key, signal, event.recorded_at, config)
        };
        let pattern = store.fold_preference_pattern(*dimension, key, &fold).await?;
        tracing::debug!(
            "Folded {}={} signal={:.2} → score={:.3} confidence={:.2} n={}",
            dimension,
            key,
            signal,
            pattern.preference_score,
            pattern.confidence,
            pattern.sample_size
        );
    }

    Ok(keys.len())
}

/// Known preferences: patterns above the scoring confidence threshold.
pub async fn get_user_preferences(
    store: &dyn Store,
    config: &ScoringConfig,
) -> Result<UserPreferences> {
    let patterns = store.list_preference_patterns().await?;
    Ok(UserPreferences::from_patterns(
        &patterns,
        config.confidence_threshold,
    ))
}

/// Adjustment for one stored record. `NotFound` if the record is unknown.
pub async fn get_score_adjustment(
    store: &dyn Store,
    config: &ScoringConfig,
    content_id: &str,
) -> Result<f64> {
    let record = store
        .get_content_record(content_id)
        .await?
        .ok_or_else(|| PrismError::NotFound(format!("content record '{}'", content_id)))?;
    let prefs = get_user_preferences(store, config).await?;
    Ok(scoring::adjustment_for(&record, &prefs, config))
}

/// Active records ranked by preference-adjusted score.
pub async fn recommendations(
    store: &dyn Store,
    config: &ScoringConfig,
    limit: usize,
) -> Result<Vec<Recommendation>> {
    let records = store.query_content_records(&ContentFilter::active()).await?;
    let prefs = get_user_preferences(store, config).await?;
    Ok(scoring::rank(&records, &prefs, config, limit))
}

/// Rebuild every pattern from the feedback log in `recorded_at` order.
pub async fn replay(store: &dyn Store, config: &PrismConfig) -> Result<ReplayReport> {
    let _exclusive = LEARNING_GATE.write().await;
    let start = std::time::Instant::now();
    let mut report = ReplayReport::default();

    store.clear_preference_patterns().await?;
    let events = store.list_feedback_events(None).await?;

    for event in &events {
        let record = match store.get_content_record(&event.content_id).await? {
            Some(r) => r,
            None => {
                tracing::warn!(
                    "Replay skipping event {}: content record '{}' not found",
                    event.id,
                    event.content_id
                );
                report.events_skipped += 1;
                continue;
            }
        };
        report.patterns_updated += apply_event(store, &config.learning, &record, event).await?;
        report.events_replayed += 1;
    }

    tracing::info!(
        "Replay complete: {} events ({} skipped), {} folds in {}ms",
        report.events_replayed,
        report.events_skipped,
        report.patterns_updated,
        start.elapsed().as_millis()
    );

    Ok(report)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use prism_core::{Dimension, FeedbackType, MemoryStore, NewFeedback};

    #[tokio::test]
    async fn test_apply_event_touches_every_key() {
        let store = MemoryStore::new();
        let record = ContentRecord::new("p1", 7.0)
            .with_author("alice")
            .with_topic("AI")
            .with_content_type("Tool")
            .with_tags(["llm", "rust", "llm", " "]);
        let event = NewFeedback::new("p1")
            .with_type(FeedbackType::Good)
            .into_event(Utc::now());

        let folds = apply_event(&store, &LearningConfig::default(), &record, &event)
            .await
            .unwrap();
        assert_eq!(folds, 5);

        let llm = store
            .get_preference_pattern(Dimension::Tag, "llm")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(llm.sample_size, 1, "duplicate tags fold once per event");
        assert_eq!(llm.preference_score, 0.6);
        assert_eq!(llm.last_updated, event.recorded_at);
    }

    #[tokio::test]
    async fn test_record_without_descriptors_touches_nothing() {
        let store = MemoryStore::new();
        let record = ContentRecord::new("bare", 5.0);
        let event = NewFeedback::new("bare").with_rating(5).into_event(Utc::now());

        let folds = apply_event(&store, &LearningConfig::default(), &record, &event)
            .await
            .unwrap();
        assert_eq!(folds, 0);
        assert!(store.list_preference_patterns().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replay_during_live_feedback_folds_each_event_once() {
        use crate::subsystems::feedback;
        use std::sync::Arc;

        let store = Arc::new(
            MemoryStore::with_records([ContentRecord::new("p1", 7.0).with_author("alice")]).await,
        );
        let config = PrismConfig::in_memory();
        for _ in 0..5 {
            feedback::record_feedback(store.as_ref(), &config, NewFeedback::new("p1").with_rating(4))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let config = PrismConfig::in_memory();
                if i % 5 == 0 {
                    replay(store.as_ref(), &config).await.map(|_| ())
                } else {
                    feedback::record_feedback(
                        store.as_ref(),
                        &config,
                        NewFeedback::new("p1").with_type(FeedbackType::Good),
                    )
                    .await
                    .map(|_| ())
                }
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let events = store.list_feedback_events(None).await.unwrap();
        assert_eq!(events.len(), 21);
        let alice = store
            .get_preference_pattern(Dimension::Author, "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alice.sample_size, 21);

        let live = store.list_preference_patterns().await.unwrap();
        replay(store.as_ref(), &config).await.unwrap();
        assert_eq!(store.list_preference_patterns().await.unwrap(), live);
    }

    #[tokio::test]
    async fn test_adjustment_unknown_record() {
        let store = MemoryStore::new();
        let err = get_score_adjustment(&store, &ScoringConfig::default(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, PrismError::NotFound(_)));
    }
}
