//! Categorization, trending and collection views over stored records.

use chrono::{DateTime, Duration, Utc};
use prism_core::config::{ScoringConfig, TrendingConfig};
use prism_core::organizer::{self, AuthorCollection, Group};
use prism_core::{ContentFilter, ContentRecord, PrismError, Result, Store, TrendingItem};
use serde::Serialize;

use super::preferences;

const AUTHOR_COLLECTION_MIN_POSTS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryReport {
    pub content_id: String,
    pub category: String,
    pub topic: String,
    pub complexity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Collections {
    pub tools_by_category: Vec<Group>,
    pub opinions_by_topic: Vec<Group>,
    pub learning_by_level: Vec<Group>,
    pub author_collections: Vec<AuthorCollection>,
    pub smart_collections: Vec<Group>,
}

/// Trending tags and topics over the last `window_days` (config default when `None`).
pub async fn get_trending(
    store: &dyn Store,
    config: &TrendingConfig,
    window_days: Option<u32>,
) -> Result<Vec<TrendingItem>> {
    let days = window_days.unwrap_or(config.window_days);
    let since = window_start(Utc::now(), days);
    let filter = match since {
        Some(since) => ContentFilter::active().since(since),
        None => ContentFilter::active(),
    };
    let records = store.query_content_records(&filter).await?;
    let items = organizer::trending(&records, since.unwrap_or(DateTime::<Utc>::MIN_UTC), config);
    tracing::debug!(
        "Trending over {} days: {} records → {} items",
        days,
        records.len(),
        items.len()
    );
    Ok(items)
}

/// Start of a `days`-long window ending at `now`; `None` when the window reaches past the
/// representable range and every record counts.
fn window_start(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days)).and_then(|window| now.checked_sub_signed(window))
}

/// Category, topic and complexity for a stored record.
pub async fn categorize(store: &dyn Store, content_id: &str) -> Result<CategoryReport> {
    let record = store
        .get_content_record(content_id)
        .await?
        .ok_or_else(|| PrismError::NotFound(format!("content record '{}'", content_id)))?;

    Ok(CategoryReport {
        content_id: record.id.clone(),
        category: organizer::categorize(&record).to_string(),
        topic: record
            .topic_key()
            .map(str::to_string)
            .unwrap_or_else(|| organizer::infer_topic(&record.content).to_string()),
        complexity: organizer::infer_complexity(&record.content).to_string(),
    })
}

/// Insert or replace a record; fills in the category when the pipeline left it blank.
pub async fn upsert_content(store: &dyn Store, mut record: ContentRecord) -> Result<ContentRecord> {
    if record.id.trim().is_empty() {
        return Err(PrismError::InvalidArgument("content id must not be empty".into()));
    }
    if record.category.as_deref().map_or(true, |c| c.trim().is_empty()) {
        record.category = Some(organizer::categorize(&record).to_string());
    }
    store.upsert_content_record(&record).await?;
    tracing::debug!("Upserted content record '{}'", record.id);
    Ok(record)
}

pub async fn collections(store: &dyn Store, config: &ScoringConfig) -> Result<Collections> {
    let records = store.query_content_records(&ContentFilter::active()).await?;
    let prefs = preferences::get_user_preferences(store, config).await?;

    Ok(Collections {
        tools_by_category: organizer::tools_by_category(&records),
        opinions_by_topic: organizer::opinions_by_topic(&records),
        learning_by_level: organizer::learning_by_level(&records),
        author_collections: organizer::author_collections(&records, AUTHOR_COLLECTION_MIN_POSTS),
        smart_collections: organizer::smart_collections(&records, &prefs),
    })
}

pub async fn markdown_export(store: &dyn Store) -> Result<String> {
    let records = store.query_content_records(&ContentFilter::active()).await?;
    Ok(organizer::markdown_export(&records))
}
