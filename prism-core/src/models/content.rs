use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A collected item as supplied by the collection/analysis pipeline.
///
/// The engine only reads the descriptive fields; the feedback fields at the
/// bottom are written back through [`crate::store::Store::update_content_feedback_fields`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentRecord {
    pub id: String,
    pub author: Option<String>,
    pub topic: Option<String>,
    pub content_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub base_value_score: f64,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub complexity_level: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(default)]
    pub user_rating: Option<i32>,
    #[serde(default)]
    pub is_gold: bool,
    #[serde(default)]
    pub user_feedback_notes: Option<String>,
    #[serde(default)]
    pub feedback_timestamp: Option<DateTime<Utc>>,
}

impl ContentRecord {
    pub fn new(id: impl Into<String>, base_value_score: f64) -> Self {
        Self {
            id: id.into(),
            author: None,
            topic: None,
            content_type: None,
            tags: Vec::new(),
            base_value_score,
            created_at: Utc::now(),
            title: None,
            content: String::new(),
            url: None,
            category: None,
            complexity_level: None,
            is_deleted: false,
            user_rating: None,
            is_gold: false,
            user_feedback_notes: None,
            feedback_timestamp: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Author, if present and not blank.
    pub fn author_key(&self) -> Option<&str> {
        non_blank(self.author.as_deref())
    }

    /// Topic, if present and not blank.
    pub fn topic_key(&self) -> Option<&str> {
        non_blank(self.topic.as_deref())
    }

    /// Content type, if present and not blank.
    pub fn content_type_key(&self) -> Option<&str> {
        non_blank(self.content_type.as_deref())
    }

    /// Non-blank tags in order, duplicates removed.
    pub fn tag_keys(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.tags.len());
        for tag in &self.tags {
            if let Some(t) = non_blank(Some(tag.as_str())) {
                if !seen.contains(&t) {
                    seen.push(t);
                }
            }
        }
        seen
    }

    /// Smart title if set, otherwise the first 100 characters of the body.
    pub fn display_title(&self) -> String {
        match non_blank(self.title.as_deref()) {
            Some(t) => t.to_string(),
            None => self.content.chars().take(100).collect(),
        }
    }

    pub fn content_type_contains_any(&self, needles: &[&str]) -> bool {
        let ct = match self.content_type.as_deref() {
            Some(ct) => ct.to_lowercase(),
            None => return false,
        };
        needles.iter().any(|n| ct.contains(&n.to_lowercase()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Decode a persisted tag collection (a JSON array of strings).
///
/// Anything unparsable yields an empty list; non-string entries are dropped.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => return Vec::new(),
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Err(e) => {
            tracing::debug!("Skipping malformed tag collection {:?}: {}", raw, e);
            Vec::new()
        }
    }
}

/// Selection criteria for [`crate::store::Store::query_content_records`].
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    /// Only records created at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub include_deleted: bool,
    pub author: Option<String>,
    pub gold_only: bool,
    /// Case-insensitive substrings; a record matches if its content type contains any.
    pub content_type_contains: Vec<String>,
    pub limit: Option<usize>,
}

impl ContentFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn content_types(mut self, needles: &[&str]) -> Self {
        self.content_type_contains = needles.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn matches(&self, record: &ContentRecord) -> bool {
        if record.is_deleted && !self.include_deleted {
            return false;
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(author) = &self.author {
            if record.author.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        if self.gold_only && !record.is_gold {
            return false;
        }
        if !self.content_type_contains.is_empty() {
            let needles: Vec<&str> = self.content_type_contains.iter().map(String::as_str).collect();
            if !record.content_type_contains_any(&needles) {
                return false;
            }
        }
        true
    }
}
