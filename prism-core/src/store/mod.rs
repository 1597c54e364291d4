//! Storage interface between the engine and its persistence collaborator.
//!
//! Two implementations:
//! - [`PgStore`]: PostgreSQL via sqlx; survives restarts.
//! - [`MemoryStore`]: `tokio::sync::RwLock` maps; for tests and ephemeral runs.
//!
//! Preference folds go through [`Store::fold_preference_pattern`], which must run the
//! read-modify-write of one (dimension, key) atomically.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{ContentFilter, ContentRecord, Dimension, FeedbackEvent, PreferencePattern};

/// Computes the next pattern state from the current one (`None` when absent).
pub type PatternFold<'a> = dyn Fn(Option<&PreferencePattern>) -> PreferencePattern + Send + Sync + 'a;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_content_record(&self, id: &str) -> Result<Option<ContentRecord>>;

    /// Insert or replace a record; used by the collection pipeline and tests.
    async fn upsert_content_record(&self, record: &ContentRecord) -> Result<()>;

    /// Write the denormalized feedback fields. `NotFound` if the record does not exist.
    async fn update_content_feedback_fields(
        &self,
        id: &str,
        rating: Option<i32>,
        is_gold: bool,
        notes: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()>;

    /// Matching records, newest first.
    async fn query_content_records(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>>;

    async fn append_feedback_event(&self, event: &FeedbackEvent) -> Result<()>;

    /// Feedback events in `recorded_at` order, optionally for one record.
    async fn list_feedback_events(&self, content_id: Option<&str>) -> Result<Vec<FeedbackEvent>>;

    async fn get_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<PreferencePattern>>;

    async fn upsert_preference_pattern(&self, pattern: &PreferencePattern) -> Result<()>;

    /// Atomically replace the pattern for (dimension, key) with `fold(current)`.
    async fn fold_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
        fold: &PatternFold<'_>,
    ) -> Result<PreferencePattern>;

    /// All patterns, ordered by dimension then key.
    async fn list_preference_patterns(&self) -> Result<Vec<PreferencePattern>>;

    async fn clear_preference_patterns(&self) -> Result<()>;

    /// Backend description for health endpoints.
    async fn health_check(&self) -> Result<String>;
}
