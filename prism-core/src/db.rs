use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Tables owned or read by the engine. Idempotent; run on every startup.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    post_id            TEXT PRIMARY KEY,
    author             TEXT,
    topic              TEXT,
    content_type       TEXT,
    smart_tags         TEXT,
    value_score        DOUBLE PRECISION NOT NULL DEFAULT 0,
    created_timestamp  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    smart_title        TEXT,
    content            TEXT NOT NULL DEFAULT '',
    url                TEXT,
    category           TEXT,
    complexity_level   TEXT,
    is_deleted         BOOLEAN NOT NULL DEFAULT FALSE,
    user_rating        INTEGER,
    is_gold            BOOLEAN NOT NULL DEFAULT FALSE,
    user_feedback      TEXT,
    feedback_timestamp TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS posts_created_idx ON posts (created_timestamp DESC);

CREATE TABLE IF NOT EXISTS user_feedback (
    id            UUID PRIMARY KEY,
    seq           BIGSERIAL NOT NULL,
    post_id       TEXT NOT NULL REFERENCES posts (post_id),
    feedback_type TEXT,
    rating        INTEGER,
    user_notes    TEXT NOT NULL DEFAULT '',
    recorded_at   TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- append order for tables created before seq existed
DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM information_schema.columns
        WHERE table_name = 'user_feedback' AND column_name = 'seq'
    ) THEN
        ALTER TABLE user_feedback ADD COLUMN seq BIGSERIAL NOT NULL;
    END IF;
END $$;

CREATE INDEX IF NOT EXISTS user_feedback_recorded_idx ON user_feedback (recorded_at, seq);

CREATE TABLE IF NOT EXISTS learning_patterns (
    pattern_type     TEXT NOT NULL,
    pattern_key      TEXT NOT NULL,
    preference_score DOUBLE PRECISION NOT NULL,
    confidence_level DOUBLE PRECISION NOT NULL,
    sample_size      BIGINT NOT NULL,
    last_updated     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (pattern_type, pattern_key)
);
"#;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
