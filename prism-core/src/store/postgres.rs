//! PostgreSQL store
//!
//! Tables: `posts` (content records + feedback fields), `user_feedback` (append-only log),
//! `learning_patterns` (one row per (pattern_type, pattern_key)).
//!
//! Folds run inside a transaction holding `pg_advisory_xact_lock(hashtext(type:key))`,
//! so two folds on the same key serialize even when the row does not exist yet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{PatternFold, Store};
use crate::config::DatabaseConfig;
use crate::db;
use crate::error::{PrismError, Result};
use crate::models::{
    parse_tags, ContentFilter, ContentRecord, Dimension, FeedbackEvent, PreferencePattern,
};

const POST_COLUMNS: &str = "post_id, author, topic, content_type, smart_tags, value_score, \
     created_timestamp, smart_title, content, url, category, complexity_level, is_deleted, \
     user_rating, is_gold, user_feedback, feedback_timestamp";

#[derive(Debug, sqlx::FromRow)]
struct PostRow {
    post_id: String,
    author: Option<String>,
    topic: Option<String>,
    content_type: Option<String>,
    smart_tags: Option<String>,
    value_score: f64,
    created_timestamp: DateTime<Utc>,
    smart_title: Option<String>,
    content: String,
    url: Option<String>,
    category: Option<String>,
    complexity_level: Option<String>,
    is_deleted: bool,
    user_rating: Option<i32>,
    is_gold: bool,
    user_feedback: Option<String>,
    feedback_timestamp: Option<DateTime<Utc>>,
}

impl From<PostRow> for ContentRecord {
    fn from(row: PostRow) -> Self {
        Self {
            tags: parse_tags(row.smart_tags.as_deref()),
            id: row.post_id,
            author: row.author,
            topic: row.topic,
            content_type: row.content_type,
            base_value_score: row.value_score,
            created_at: row.created_timestamp,
            title: row.smart_title,
            content: row.content,
            url: row.url,
            category: row.category,
            complexity_level: row.complexity_level,
            is_deleted: row.is_deleted,
            user_rating: row.user_rating,
            is_gold: row.is_gold,
            user_feedback_notes: row.user_feedback,
            feedback_timestamp: row.feedback_timestamp,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    post_id: String,
    feedback_type: Option<String>,
    rating: Option<i32>,
    user_notes: String,
    recorded_at: DateTime<Utc>,
}

impl From<FeedbackRow> for FeedbackEvent {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            content_id: row.post_id,
            feedback_type: row.feedback_type.and_then(|t| t.parse().ok()),
            rating: row.rating,
            notes: row.user_notes,
            recorded_at: row.recorded_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PatternRow {
    pattern_type: String,
    pattern_key: String,
    preference_score: f64,
    confidence_level: f64,
    sample_size: i64,
    last_updated: DateTime<Utc>,
}

impl TryFrom<PatternRow> for PreferencePattern {
    type Error = PrismError;

    fn try_from(row: PatternRow) -> Result<Self> {
        Ok(Self {
            dimension: row.pattern_type.parse()?,
            pattern_key: row.pattern_key,
            preference_score: row.preference_score,
            confidence: row.confidence_level,
            sample_size: row.sample_size.clamp(0, i64::from(u32::MAX)) as u32,
            last_updated: row.last_updated,
        })
    }
}

const UPSERT_PATTERN: &str = r#"
    INSERT INTO learning_patterns
        (pattern_type, pattern_key, preference_score, confidence_level, sample_size, last_updated)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (pattern_type, pattern_key)
    DO UPDATE SET
        preference_score = EXCLUDED.preference_score,
        confidence_level = EXCLUDED.confidence_level,
        sample_size = EXCLUDED.sample_size,
        last_updated = EXCLUDED.last_updated
"#;

const SELECT_PATTERN: &str = r#"
    SELECT pattern_type, pattern_key, preference_score, confidence_level, sample_size, last_updated
    FROM learning_patterns
    WHERE pattern_type = $1 AND pattern_key = $2
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = db::create_pool(config).await?;
        db::ensure_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn get_content_record(&self, id: &str) -> Result<Option<ContentRecord>> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {} FROM posts WHERE post_id = $1",
            POST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ContentRecord::from))
    }

    async fn upsert_content_record(&self, record: &ContentRecord) -> Result<()> {
        let tags = serde_json::to_string(&record.tags).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            r#"
            INSERT INTO posts (
                post_id, author, topic, content_type, smart_tags, value_score,
                created_timestamp, smart_title, content, url, category, complexity_level,
                is_deleted, user_rating, is_gold, user_feedback, feedback_timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (post_id) DO UPDATE SET
                author = EXCLUDED.author,
                topic = EXCLUDED.topic,
                content_type = EXCLUDED.content_type,
                smart_tags = EXCLUDED.smart_tags,
                value_score = EXCLUDED.value_score,
                created_timestamp = EXCLUDED.created_timestamp,
                smart_title = EXCLUDED.smart_title,
                content = EXCLUDED.content,
                url = EXCLUDED.url,
                category = EXCLUDED.category,
                complexity_level = EXCLUDED.complexity_level,
                is_deleted = EXCLUDED.is_deleted,
                user_rating = EXCLUDED.user_rating,
                is_gold = EXCLUDED.is_gold,
                user_feedback = EXCLUDED.user_feedback,
                feedback_timestamp = EXCLUDED.feedback_timestamp
            "#,
        )
        .bind(&record.id)
        .bind(&record.author)
        .bind(&record.topic)
        .bind(&record.content_type)
        .bind(tags)
        .bind(record.base_value_score)
        .bind(record.created_at)
        .bind(&record.title)
        .bind(&record.content)
        .bind(&record.url)
        .bind(&record.category)
        .bind(&record.complexity_level)
        .bind(record.is_deleted)
        .bind(record.user_rating)
        .bind(record.is_gold)
        .bind(&record.user_feedback_notes)
        .bind(record.feedback_timestamp)
        .execute(&self.pool)
        .await?;
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
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET user_rating = $1, is_gold = $2, user_feedback = $3, feedback_timestamp = $4
            WHERE post_id = $5
            "#,
        )
        .bind(rating)
        .bind(is_gold)
        .bind(notes)
        .bind(timestamp)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(PrismError::NotFound(format!("content record '{}'", id)));
        }
        Ok(())
    }

    async fn query_content_records(&self, filter: &ContentFilter) -> Result<Vec<ContentRecord>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM posts WHERE TRUE", POST_COLUMNS));

        if !filter.include_deleted {
            qb.push(" AND is_deleted = FALSE");
        }
        if let Some(since) = filter.since {
            qb.push(" AND created_timestamp >= ").push_bind(since);
        }
        if let Some(author) = &filter.author {
            qb.push(" AND author = ").push_bind(author.clone());
        }
        if filter.gold_only {
            qb.push(" AND is_gold = TRUE");
        }
        if !filter.content_type_contains.is_empty() {
            let patterns: Vec<String> = filter
                .content_type_contains
                .iter()
                .map(|n| format!("%{}%", n))
                .collect();
            qb.push(" AND content_type ILIKE ANY(").push_bind(patterns).push(")");
        }
        qb.push(" ORDER BY created_timestamp DESC, post_id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build_query_as::<PostRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn append_feedback_event(&self, event: &FeedbackEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_feedback (id, post_id, feedback_type, rating, user_notes, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(&event.content_id)
        .bind(event.feedback_type.map(|t| t.as_str()))
        .bind(event.rating)
        .bind(&event.notes)
        .bind(event.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_feedback_events(&self, content_id: Option<&str>) -> Result<Vec<FeedbackEvent>> {
        let rows = sqlx::query_as::<_, FeedbackRow>(
            r#"
            SELECT id, post_id, feedback_type, rating, user_notes, recorded_at
            FROM user_feedback
            WHERE ($1::TEXT IS NULL OR post_id = $1)
            ORDER BY recorded_at ASC, seq ASC
            "#,
        )
        .bind(content_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(FeedbackEvent::from).collect())
    }

    async fn get_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<PreferencePattern>> {
        let row = sqlx::query_as::<_, PatternRow>(SELECT_PATTERN)
            .bind(dimension.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PreferencePattern::try_from).transpose()
    }

    async fn upsert_preference_pattern(&self, pattern: &PreferencePattern) -> Result<()> {
        sqlx::query(UPSERT_PATTERN)
            .bind(pattern.dimension.as_str())
            .bind(&pattern.pattern_key)
            .bind(pattern.preference_score)
            .bind(pattern.confidence)
            .bind(i64::from(pattern.sample_size))
            .bind(pattern.last_updated)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fold_preference_pattern(
        &self,
        dimension: Dimension,
        key: &str,
        fold: &PatternFold<'_>,
    ) -> Result<PreferencePattern> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", dimension.as_str(), key))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, PatternRow>(SELECT_PATTERN)
            .bind(dimension.as_str())
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
            .map(PreferencePattern::try_from)
            .transpose()?;

        let next = fold(existing.as_ref());

        sqlx::query(UPSERT_PATTERN)
            .bind(next.dimension.as_str())
            .bind(&next.pattern_key)
            .bind(next.preference_score)
            .bind(next.confidence)
            .bind(i64::from(next.sample_size))
            .bind(next.last_updated)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(next)
    }

    async fn list_preference_patterns(&self) -> Result<Vec<PreferencePattern>> {
        let rows = sqlx::query_as::<_, PatternRow>(
            r#"
            SELECT pattern_type, pattern_key, preference_score, confidence_level, sample_size, last_updated
            FROM learning_patterns
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut patterns = rows
            .into_iter()
            .map(PreferencePattern::try_from)
            .collect::<Result<Vec<_>>>()?;
        patterns.sort_by(|a, b| {
            a.dimension
                .cmp(&b.dimension)
                .then_with(|| a.pattern_key.cmp(&b.pattern_key))
        });
        Ok(patterns)
    }

    async fn clear_preference_patterns(&self) -> Result<()> {
        sqlx::query("DELETE FROM learning_patterns")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<String> {
        Ok(db::health_check(&self.pool).await?)
    }
}
