//! Content organizer: keyword categorization, trending and grouped views.
//!
//! Categorization is a set of ordered rule tables. The first rule with a matching
//! keyword wins, so table order is part of the contract: "AI coding assistant" is
//! AI & Machine Learning, not Development & Coding.
//!
//! Keyword matching is case-insensitive. Keywords of three characters or fewer
//! ("ai", "ui", "api") must match a whole word; longer keywords match as substrings.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::TrendingConfig;
use crate::models::{ContentRecord, Dimension, TrendKind, TrendingItem, UserPreferences};

// ============================================================================
// RULE TABLES
// ============================================================================

/// A labelled keyword set. A rule matches when any keyword matches.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

pub const CATEGORY_RULES: &[KeywordRule] = &[
    KeywordRule {
        label: "AI & Machine Learning",
        keywords: &["ai", "machine learning", "gpt", "llm", "chatbot", "claude", "gemini"],
    },
    KeywordRule {
        label: "Development & Coding",
        keywords: &["code", "programming", "api", "github", "deployment", "docker"],
    },
    KeywordRule {
        label: "Design & Visual",
        keywords: &["design", "ui", "ux", "figma", "canva", "image", "visual"],
    },
    KeywordRule {
        label: "Productivity & Automation",
        keywords: &["productivity", "automation", "workflow", "task", "calendar", "notes"],
    },
    KeywordRule {
        label: "Marketing & Analytics",
        keywords: &["marketing", "social media", "analytics", "seo", "email"],
    },
    KeywordRule {
        label: "Writing & Content",
        keywords: &["writing", "editor", "grammar", "content", "blog"],
    },
    KeywordRule {
        label: "Browser & Web",
        keywords: &["browser", "extension", "web", "chrome", "firefox"],
    },
];
pub const CATEGORY_DEFAULT: &str = "Other Tools";

pub const TOPIC_RULES: &[KeywordRule] = &[
    KeywordRule {
        label: "Startup & Business",
        keywords: &["startup", "business", "entrepreneur", "funding"],
    },
    KeywordRule {
        label: "AI & Technology",
        keywords: &["ai", "artificial intelligence", "machine learning"],
    },
    KeywordRule {
        label: "Productivity",
        keywords: &["productivity", "efficiency", "workflow"],
    },
    KeywordRule {
        label: "Design",
        keywords: &["design", "ui", "ux", "creative"],
    },
    KeywordRule {
        label: "Development",
        keywords: &["programming", "development", "coding"],
    },
    KeywordRule {
        label: "Marketing & Growth",
        keywords: &["marketing", "growth", "sales"],
    },
];
pub const TOPIC_DEFAULT: &str = "General";

pub const COMPLEXITY_RULES: &[KeywordRule] = &[
    KeywordRule {
        label: "Beginner",
        keywords: &["beginner", "intro", "basics", "getting started", "simple"],
    },
    KeywordRule {
        label: "Advanced",
        keywords: &["advanced", "expert", "complex", "deep dive", "master"],
    },
    KeywordRule {
        label: "Intermediate",
        keywords: &["intermediate", "beyond basics", "next level"],
    },
];
pub const COMPLEXITY_DEFAULT: &str = "Intermediate";
pub const COMPLEXITY_LEVELS: [&str; 4] = ["Beginner", "Intermediate", "Advanced", "Expert"];

const TOOL_TYPES: &[&str] = &["tool", "app", "software"];
const OPINION_TYPES: &[&str] = &["opinion", "insight", "analysis"];
const LEARNING_TYPES: &[&str] = &["tutorial", "guide", "course"];

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"));

/// Lower-cased text plus its word set, built once per record.
struct Haystack {
    text: String,
    words: HashSet<String>,
}

impl Haystack {
    fn new<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let text = parts.into_iter().collect::<Vec<_>>().join(" ").to_lowercase();
        let words = WORD.find_iter(&text).map(|m| m.as_str().to_string()).collect();
        Self { text, words }
    }

    fn contains(&self, keyword: &str) -> bool {
        if keyword.chars().count() <= 3 {
            self.words.contains(keyword)
        } else {
            self.text.contains(keyword)
        }
    }
}

fn first_match(rules: &[KeywordRule], default: &'static str, haystack: &Haystack) -> &'static str {
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|kw| haystack.contains(kw)))
        .map(|rule| rule.label)
        .unwrap_or(default)
}

// ============================================================================
// CATEGORIZATION
// ============================================================================

/// Category bucket from content text, tags and topic.
pub fn categorize_text(content: &str, tags: &[String], topic: Option<&str>) -> &'static str {
    let parts = std::iter::once(content)
        .chain(tags.iter().map(String::as_str))
        .chain(topic);
    first_match(CATEGORY_RULES, CATEGORY_DEFAULT, &Haystack::new(parts))
}

pub fn categorize(record: &ContentRecord) -> &'static str {
    categorize_text(&record.content, &record.tags, record.topic.as_deref())
}

pub fn infer_topic(content: &str) -> &'static str {
    first_match(TOPIC_RULES, TOPIC_DEFAULT, &Haystack::new([content]))
}

pub fn infer_complexity(content: &str) -> &'static str {
    first_match(COMPLEXITY_RULES, COMPLEXITY_DEFAULT, &Haystack::new([content]))
}

// ============================================================================
// TRENDING
// ============================================================================

#[derive(Default)]
struct Tally {
    count: usize,
    total: f64,
}

/// Trending tags and topics among active records created at or after `since`.
///
/// `trending_score = count × mean(base_value_score)`. The top `tag_candidates` tags and
/// `topic_candidates` topics by count are merged, ranked by trending score and
/// truncated to `max_items`.
pub fn trending(
    records: &[ContentRecord],
    since: DateTime<Utc>,
    config: &TrendingConfig,
) -> Vec<TrendingItem> {
    let mut tags: HashMap<&str, Tally> = HashMap::new();
    let mut topics: HashMap<&str, Tally> = HashMap::new();

    for record in records.iter().filter(|r| !r.is_deleted && r.created_at >= since) {
        for tag in record.tag_keys() {
            let t = tags.entry(tag).or_default();
            t.count += 1;
            t.total += record.base_value_score;
        }
        if let Some(topic) = record.topic_key() {
            let t = topics.entry(topic).or_default();
            t.count += 1;
            t.total += record.base_value_score;
        }
    }

    let mut items = most_common(tags, TrendKind::Tag, config.tag_candidates);
    items.extend(most_common(topics, TrendKind::Topic, config.topic_candidates));

    items.sort_by(|a, b| {
        b.trending_score
            .partial_cmp(&a.trending_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    items.truncate(config.max_items);
    items
}

fn most_common(counts: HashMap<&str, Tally>, kind: TrendKind, take: usize) -> Vec<TrendingItem> {
    let mut entries: Vec<(&str, Tally)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(b.0)));
    entries
        .into_iter()
        .take(take)
        .map(|(name, tally)| {
            let avg_score = tally.total / tally.count as f64;
            TrendingItem {
                name: name.to_string(),
                kind,
                count: tally.count,
                avg_score,
                trending_score: tally.count as f64 * avg_score,
            }
        })
        .collect()
}

// ============================================================================
// GROUPED VIEWS
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContentSummary {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub value_score: f64,
    pub url: Option<String>,
    pub content_type: Option<String>,
}

impl From<&ContentRecord> for ContentSummary {
    fn from(r: &ContentRecord) -> Self {
        Self {
            id: r.id.clone(),
            title: r.display_title(),
            author: r.author.clone(),
            value_score: r.base_value_score,
            url: r.url.clone(),
            content_type: r.content_type.clone(),
        }
    }
}

/// A named, ordered group of records.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Group {
    pub name: String,
    pub items: Vec<ContentSummary>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AuthorCollection {
    pub author: String,
    pub post_count: usize,
    pub avg_score: f64,
    pub posts: Vec<ContentSummary>,
}

fn by_value_desc(items: &mut [ContentSummary]) {
    items.sort_by(|a, b| {
        b.value_score
            .partial_cmp(&a.value_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn active(records: &[ContentRecord]) -> impl Iterator<Item = &ContentRecord> {
    records.iter().filter(|r| !r.is_deleted)
}

/// Tools, apps and software grouped by category, in rule order.
pub fn tools_by_category(records: &[ContentRecord]) -> Vec<Group> {
    let mut buckets: HashMap<&'static str, Vec<ContentSummary>> = HashMap::new();
    for record in active(records).filter(|r| r.content_type_contains_any(TOOL_TYPES)) {
        buckets.entry(categorize(record)).or_default().push(record.into());
    }

    CATEGORY_RULES
        .iter()
        .map(|rule| rule.label)
        .chain(std::iter::once(CATEGORY_DEFAULT))
        .filter_map(|label| {
            let mut items = buckets.remove(label)?;
            by_value_desc(&mut items);
            Some(Group { name: label.to_string(), items })
        })
        .collect()
}

/// Opinions, insights and analyses grouped by stored or inferred topic.
pub fn opinions_by_topic(records: &[ContentRecord]) -> Vec<Group> {
    let mut buckets: HashMap<String, Vec<ContentSummary>> = HashMap::new();
    for record in active(records).filter(|r| r.content_type_contains_any(OPINION_TYPES)) {
        let topic = record
            .topic_key()
            .map(str::to_string)
            .unwrap_or_else(|| infer_topic(&record.content).to_string());
        buckets.entry(topic).or_default().push(record.into());
    }

    let mut groups: Vec<Group> = buckets
        .into_iter()
        .map(|(name, mut items)| {
            by_value_desc(&mut items);
            Group { name, items }
        })
        .collect();
    groups.sort_by(|a, b| a.name.cmp(&b.name));
    groups
}

/// Tutorials, guides and courses grouped by complexity level; empty levels omitted.
pub fn learning_by_level(records: &[ContentRecord]) -> Vec<Group> {
    let mut buckets: HashMap<&'static str, Vec<ContentSummary>> = HashMap::new();
    for record in active(records).filter(|r| r.content_type_contains_any(LEARNING_TYPES)) {
        let stated = record.complexity_level.as_deref().map(str::trim);
        let level = match stated.and_then(|s| COMPLEXITY_LEVELS.iter().find(|l| **l == s)) {
            Some(level) => *level,
            None if stated.map_or(true, str::is_empty) => infer_complexity(&record.content),
            None => COMPLEXITY_DEFAULT,
        };
        buckets.entry(level).or_default().push(record.into());
    }

    COMPLEXITY_LEVELS
        .iter()
        .filter_map(|level| {
            let mut items = buckets.remove(level)?;
            by_value_desc(&mut items);
            Some(Group { name: level.to_string(), items })
        })
        .collect()
}

/// Authors with at least `min_posts` records, best average value first; top 10 posts each.
pub fn author_collections(records: &[ContentRecord], min_posts: usize) -> Vec<AuthorCollection> {
    let mut by_author: HashMap<&str, Vec<&ContentRecord>> = HashMap::new();
    for record in active(records) {
        if let Some(author) = record.author_key() {
            by_author.entry(author).or_default().push(record);
        }
    }

    let mut collections: Vec<AuthorCollection> = by_author
        .into_iter()
        .filter(|(_, posts)| posts.len() >= min_posts.max(1))
        .map(|(author, posts)| {
            let avg_score = posts.iter().map(|r| r.base_value_score).sum::<f64>() / posts.len() as f64;
            let mut items: Vec<ContentSummary> = posts.iter().map(|r| (*r).into()).collect();
            by_value_desc(&mut items);
            items.truncate(10);
            AuthorCollection {
                author: author.to_string(),
                post_count: posts.len(),
                avg_score,
                posts: items,
            }
        })
        .collect();

    collections.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.post_count.cmp(&a.post_count))
            .then_with(|| a.author.cmp(&b.author))
    });
    collections
}

pub const GOLD_COLLECTION: &str = "Gold Collection";
pub const TOP_TOOLS_COLLECTION: &str = "Top Tools";
pub const LEARNING_COLLECTION: &str = "Learning Resources";

/// Curated collections: gold, top tools, learning resources and the favorite author.
pub fn smart_collections(records: &[ContentRecord], prefs: &UserPreferences) -> Vec<Group> {
    let mut gold: Vec<&ContentRecord> = active(records).filter(|r| r.is_gold).collect();
    gold.sort_by(|a, b| b.feedback_timestamp.cmp(&a.feedback_timestamp));

    let top = |needles: &[&str], limit: usize| {
        let mut items: Vec<ContentSummary> = active(records)
            .filter(|r| r.content_type_contains_any(needles) && r.base_value_score > 6.0)
            .map(ContentSummary::from)
            .collect();
        by_value_desc(&mut items);
        items.truncate(limit);
        items
    };

    let mut groups = vec![
        Group {
            name: GOLD_COLLECTION.to_string(),
            items: gold.into_iter().map(ContentSummary::from).collect(),
        },
        Group {
            name: TOP_TOOLS_COLLECTION.to_string(),
            items: top(&["tool"], 20),
        },
        Group {
            name: LEARNING_COLLECTION.to_string(),
            items: top(&["tutorial", "guide"], 20),
        },
    ];

    let favorite = prefs.dimension(Dimension::Author).and_then(|authors| {
        authors
            .iter()
            .max_by(|a, b| a.1.score.partial_cmp(&b.1.score).unwrap_or(std::cmp::Ordering::Equal))
    });
    if let Some((author, pref)) = favorite {
        if pref.score > 0.5 {
            let mut items: Vec<ContentSummary> = active(records)
                .filter(|r| r.author_key() == Some(author.as_str()))
                .map(ContentSummary::from)
                .collect();
            by_value_desc(&mut items);
            items.truncate(15);
            groups.push(Group {
                name: format!("{} Collection", author),
                items,
            });
        }
    }

    groups
}

// ============================================================================
// MARKDOWN EXPORT
// ============================================================================

fn markdown_table(out: &mut String, header: &str, items: &[ContentSummary]) {
    out.push_str(&format!("| {} | Author | Score | Link |\n", header));
    out.push_str("|------|--------|-------|------|\n");
    for item in items.iter().take(10) {
        out.push_str(&format!(
            "| {} | {} | {:.1}/10 | [Link]({}) |\n",
            item.title.replace('|', "\\|").replace('\n', " "),
            item.author.as_deref().unwrap_or("unknown"),
            item.value_score,
            item.url.as_deref().unwrap_or(""),
        ));
    }
    out.push('\n');
}

/// Markdown tables for tools by category and learning resources by level.
pub fn markdown_export(records: &[ContentRecord]) -> String {
    let mut out = String::from("# Prism Smart Collections\n\n");

    let tools = tools_by_category(records);
    if !tools.is_empty() {
        out.push_str("## Tools by Category\n\n");
        for group in &tools {
            out.push_str(&format!("### {}\n\n", group.name));
            markdown_table(&mut out, "Tool", &group.items);
        }
    }

    let learning = learning_by_level(records);
    if !learning.is_empty() {
        out.push_str("## Learning Resources by Level\n\n");
        for group in &learning {
            out.push_str(&format!("### {}\n\n", group.name));
            markdown_table(&mut out, "Resource", &group.items);
        }
    }

    out
}
