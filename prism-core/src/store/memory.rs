//! In-memory store
//!
//! Async CRUD over `tokio::sync::RwLock` maps. Folds hold the pattern write lock for
//! the whole read-modify-write, which serializes updates per key (and across keys).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{PatternFold, Store};
use crate::error::{PrismError, Result};
use crate::models::{ContentFilter, ContentRecord, Dimension, FeedbackEvent, PreferencePattern};

type PatternKey = (Dimension, String);

pub struct MemoryStore {
    content: RwLock<HashMap<String, ContentRecord>>,
    feedback: RwLock<Vec<FeedbackEvent>>,
    patterns: RwLock<HashMap<PatternKey, PreferencePattern>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            content: RwLock::new(HashMap::new()),
            feedback: RwLock::new(Vec::new()),
            patterns: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the store with records.
    pub async fn with_records(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        let store = Self::new();
        {
            let mut content = store.content.write().await;
            for record in records {
                content.insert(record.id.clone(), record);
            }
        }
        store
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_content_record(&self, id: &str) -> Result<Option<ContentRecord>> {
        Ok(self.content.read().await.get(id).cloned())
    }

    async fn upsert_content_record(&self, record: &ContentRecord) -> Result<()> {
        self.content
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_content_feedback_fields(
        &self,
        id: &str,
        rating: Option<i32>,
        is_gold: bool,
        notes: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let mut content = self.content.write().await;
        let record = content
            .get_mut(id)
            .ok_or_else(|| PrismError::NotFound(format!("content record '{}'", id)))?;
        record.user_rating = rating;
        record.is_gold = is_gold;
        record.user_feedback_notes = Some(notes.to_string());
        record.feedback_timestamp = Some(timestamp);
        Ok(())
    }

    async fn query_content_records(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let content = self.content.read().await;
        let mut records: Vec<ContentRecord> = content
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn append_feedback_event(&self, event: &FeedbackEvent) -> Result<()> {
        self.feedback.write().await.push(event.clone());
        Ok(())
    }

    async fn list_feedback_events(&self, content_id: Option<&str>) -> Result<Vec<FeedbackEvent>> {
        let mut events: Vec<FeedbackEvent> = self
            .feedback
            .read()
            .await
            .iter()
            .filter(|e| content_id.map_or(true, |id| e.content_id == id))
            .cloned()
            .collect();
        // stable: equal timestamps keep append order
        events.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
        Ok(events)
    }

    async fn get_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<PreferencePattern>> {
        Ok(self
            .patterns
            .read()
            .await
            .get(&(dimension, key.to_string()))
            .cloned())
    }

    async fn upsert_preference_pattern(&self, pattern: &PreferencePattern) -> Result<()> {
        self.patterns.write().await.insert(
            (pattern.dimension, pattern.pattern_key.clone()),
            pattern.clone(),
        );
        Ok(())
    }

    async fn fold_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
        fold: &PatternFold<'_>,
    ) -> Result<PreferencePattern> {
        let mut patterns = self.patterns.write().await;
        let map_key = (dimension, key.to_string());
        let next = fold(patterns.get(&map_key));
        patterns.insert(map_key, next.clone());
        Ok(next)
    }

    async fn list_preference_patterns(&self) -> Result<Vec<PreferencePattern>> {
        let mut patterns: Vec<PreferencePattern> =
            self.patterns.read().await.values().cloned().collect();
        patterns.sort_by(|a, b| {
            a.dimension
                .cmp(&b.dimension)
                .then_with(|| a.pattern_key.cmp(&b.pattern_key))
        });
        Ok(patterns)
    }

    async fn clear_preference_patterns(&self) -> Result<()> {
        self.patterns.write().await.clear();
        Ok(())
    }

    async fn health_check(&self) -> Result<String> {
        Ok("memory".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewFeedback;
    use std::sync::Arc;

    fn pattern(key: &str, sample_size: u32) -> PreferencePattern {
        PreferencePattern {
            dimension: Dimension::Tag,
            pattern_key: key.to_string(),
            preference_score: 0.5,
            confidence: 0.1,
            sample_size,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_update_feedback_fields_unknown_record() {
        let store = MemoryStore::new();
        let err = store
            .update_content_feedback_fields("missing", Some(5), true, "", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PrismError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_feedback_fields_writes_back() {
        let store = MemoryStore::with_records([ContentRecord::new("p1", 5.0)]).await;
        let now = Utc::now();
        store
            .update_content_feedback_fields("p1", Some(4), false, "nice", now)
            .await
            .unwrap();

        let record = store.get_content_record("p1").await.unwrap().unwrap();
        assert_eq!(record.user_rating, Some(4));
        assert!(!record.is_gold);
        assert_eq!(record.user_feedback_notes.as_deref(), Some("nice"));
        assert_eq!(record.feedback_timestamp, Some(now));
    }

    #[tokio::test]
    async fn test_feedback_events_in_time_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let later = NewFeedback::new("p1").with_rating(5).into_event(now);
        let earlier = NewFeedback::new("p2").with_rating(1).into_event(now - chrono::Duration::seconds(5));
        store.append_feedback_event(&later).await.unwrap();
        store.append_feedback_event(&earlier).await.unwrap();

        let all = store.list_feedback_events(None).await.unwrap();
        assert_eq!(all.iter().map(|e| e.content_id.as_str()).collect::<Vec<_>>(), vec!["p2", "p1"]);

        let only_p1 = store.list_feedback_events(Some("p1")).await.unwrap();
        assert_eq!(only_p1.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_folds_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let fold = |existing: Option<&PreferencePattern>| {
                    pattern("llm", existing.map_or(1, |p| p.sample_size + 1))
                };
                store
                    .fold_preference_pattern(Dimension::Tag, "llm", &fold)
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let p = store
            .get_preference_pattern(Dimension::Tag, "llm")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p.sample_size, 50);
    }

    #[tokio::test]
    async fn test_list_and_clear_patterns() {
        let store = MemoryStore::new();
        store.upsert_preference_pattern(&pattern("b", 1)).await.unwrap();
        store.upsert_preference_pattern(&pattern("a", 1)).await.unwrap();

        let keys: Vec<String> = store
            .list_preference_patterns()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.pattern_key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);

        store.clear_preference_patterns().await.unwrap();
        assert!(store.list_preference_patterns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_applies_filter_and_limit() {
        let now = Utc::now();
        let store = MemoryStore::with_records([
            ContentRecord::new("old", 1.0).with_created_at(now - chrono::Duration::days(2)),
            ContentRecord::new("new", 1.0).with_created_at(now),
        ])
        .await;

        let filter = ContentFilter {
            limit: Some(1),
            ..ContentFilter::default()
        };
        let records = store.query_content_records(&filter).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "new");
    }
}
