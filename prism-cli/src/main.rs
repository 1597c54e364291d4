//! prism-cli: command-line client for the Prism HTTP API
//!
//! # Subcommands
//! - `feedback <id> [--type T] [--rating N] [--notes S]`: record feedback
//! - `preferences`: known preferences by dimension
//! - `adjust <id>`: score adjustment for a record
//! - `category <id>`: category, topic and complexity
//! - `trending [--days N]`: trending tags and topics
//! - `recommend [-n N]`: records ranked by adjusted score
//! - `stats`: feedback statistics
//! - `status`: server health
//!
//! `--json` prints the raw server response instead of the text rendering.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use reqwest::Url;
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8767";
const DEFAULT_LIMIT: usize = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "prism-cli", version, about = "Prism preference learning: command-line client")]
struct Cli {
    /// Prism HTTP server URL (overrides PRISM_HTTP_URL env var)
    #[arg(long, env = "PRISM_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// Print the raw JSON response
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Record feedback on a content record
    Feedback {
        content_id: String,

        /// gold | good | poor | irrelevant
        #[arg(short = 't', long = "type")]
        feedback_type: Option<String>,

        /// Rating from 1 to 5
        #[arg(short, long)]
        rating: Option<i32>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Show learned preferences
    Preferences,

    /// Show the score adjustment for a content record
    Adjust { content_id: String },

    /// Show category, topic and complexity for a content record
    Category { content_id: String },

    /// Show trending tags and topics
    Trending {
        /// Window in days (server default when omitted)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Show records ranked by preference-adjusted score
    Recommend {
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show feedback statistics
    Stats,

    /// Show Prism server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PreferenceEntry {
    pub score: f64,
    pub confidence: f64,
    pub sample_size: u32,
}

/// GET /preferences: dimension → key → entry
pub type Preferences = BTreeMap<String, BTreeMap<String, PreferenceEntry>>;

#[derive(Debug, Deserialize)]
pub struct TrendingItem {
    pub name: String,
    pub kind: String,
    pub count: usize,
    pub avg_score: f64,
    pub trending_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct TrendingResponse {
    pub window_days: u32,
    pub items: Vec<TrendingItem>,
}

#[derive(Debug, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub base_value_score: f64,
    pub adjustment: f64,
    pub final_score: f64,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationsResponse {
    pub results: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
pub struct RankedPreference {
    pub key: String,
    pub score: f64,
    pub confidence: f64,
    pub sample_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackStats {
    pub total_feedback: usize,
    pub feedback_by_type: BTreeMap<String, usize>,
    pub gold_posts: usize,
    pub top_authors: Vec<RankedPreference>,
    pub top_topics: Vec<RankedPreference>,
}

// ============================================================================
// Text Rendering
// ============================================================================

fn dimension_label(dimension: &str) -> &str {
    dimension.strip_suffix("_preference").unwrap_or(dimension)
}

/// Preferences grouped by dimension, strongest first within each.
pub fn format_preferences(prefs: &Preferences) -> String {
    if prefs.values().all(BTreeMap::is_empty) {
        return "No known preferences yet (need at least 3 feedback events per key).".to_string();
    }

    let mut out = String::new();
    for (dimension, entries) in prefs.iter().filter(|(_, e)| !e.is_empty()) {
        out.push_str(&format!("{}:\n", dimension_label(dimension)));
        let mut sorted: Vec<(&String, &PreferenceEntry)> = entries.iter().collect();
        sorted.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        for (key, e) in sorted {
            out.push_str(&format!(
                "  {:<24} {:+.2}  conf {:.2}  n={}\n",
                key, e.score, e.confidence, e.sample_size
            ));
        }
    }
    out
}

pub fn format_trending(resp: &TrendingResponse) -> String {
    if resp.items.is_empty() {
        return format!("Nothing trending in the last {} days.", resp.window_days);
    }
    let mut out = format!("Trending (last {} days):\n", resp.window_days);
    for (i, item) in resp.items.iter().enumerate() {
        out.push_str(&format!(
            "{:>2}. {:<24} {:<5} count {:<3} avg {:.1}  score {:.1}\n",
            i + 1,
            item.name,
            item.kind,
            item.count,
            item.avg_score,
            item.trending_score
        ));
    }
    out
}

pub fn format_recommendations(recs: &[Recommendation]) -> String {
    if recs.is_empty() {
        return "No records to recommend.".to_string();
    }
    let mut out = String::new();
    for (i, r) in recs.iter().enumerate() {
        let title: String = r.title.chars().take(60).collect();
        out.push_str(&format!(
            "{:>2}. {:.1} ({:.1} {:+.2})  {}  [{}] by {}\n",
            i + 1,
            r.final_score,
            r.base_value_score,
            r.adjustment,
            title,
            r.id,
            r.author.as_deref().unwrap_or("unknown")
        ));
    }
    out
}

pub fn format_stats(stats: &FeedbackStats) -> String {
    let mut out = format!(
        "Total feedback: {}\nGold posts:     {}\n",
        stats.total_feedback, stats.gold_posts
    );
    for (kind, count) in &stats.feedback_by_type {
        out.push_str(&format!("  {:<12} {}\n", kind, count));
    }
    for (label, list) in [("Top authors", &stats.top_authors), ("Top topics", &stats.top_topics)] {
        if list.is_empty() {
            continue;
        }
        out.push_str(&format!("{}:\n", label));
        for p in list {
            out.push_str(&format!(
                "  {:<24} {:+.2}  conf {:.2}  n={}\n",
                p.key, p.score, p.confidence, p.sample_size
            ));
        }
    }
    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

struct Client {
    http: reqwest::blocking::Client,
    base: Url,
}

/// `base` joined with percent-encoded path segments and query pairs.
fn endpoint(base: &Url, segments: &[&str], query: &[(&str, String)]) -> anyhow::Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("server URL {} cannot carry a path", base))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

impl Client {
    fn new(server: &str) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let base = Url::parse(server).with_context(|| format!("invalid server URL {}", server))?;
        Ok(Self { http, base })
    }

    fn get(&self, segments: &[&str], query: &[(&str, String)]) -> anyhow::Result<serde_json::Value> {
        let url = endpoint(&self.base, segments, query)?;
        let resp = self
            .http
            .get(url.clone())
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        Self::read(resp)
    }

    fn post(&self, segments: &[&str], body: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let url = endpoint(&self.base, segments, &[])?;
        let resp = self
            .http
            .post(url.clone())
            .json(body)
            .send()
            .with_context(|| format!("connection failed to {}", url))?;
        Self::read(resp)
    }

    fn read(resp: reqwest::blocking::Response) -> anyhow::Result<serde_json::Value> {
        let status = resp.status();
        let body: serde_json::Value = resp.json().unwrap_or_default();
        if !status.is_success() {
            bail!(
                "server returned {}: {}",
                status,
                body["error"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(body)
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let client = Client::new(&cli.server)?;

    let body = match &cli.command {
        Commands::Feedback {
            content_id,
            feedback_type,
            rating,
            notes,
        } => client.post(
            &["feedback"],
            &serde_json::json!({
                "content_id": content_id,
                "feedback_type": feedback_type,
                "rating": rating,
                "notes": notes,
            }),
        )?,
        Commands::Preferences => client.get(&["preferences"], &[])?,
        Commands::Adjust { content_id } => client.get(&["content", content_id.as_str(), "adjustment"], &[])?,
        Commands::Category { content_id } => client.get(&["content", content_id.as_str(), "category"], &[])?,
        Commands::Trending { days } => match days {
            Some(d) => client.get(&["trending"], &[("days", d.to_string())])?,
            None => client.get(&["trending"], &[])?,
        },
        Commands::Recommend { limit } => {
            client.get(&["recommendations"], &[("limit", limit.to_string())])?
        }
        Commands::Stats => client.get(&["feedback", "stats"], &[])?,
        Commands::Status => client.get(&["health"], &[])?,
    };

    if cli.json {
        return print_json(&body);
    }

    match &cli.command {
        Commands::Feedback { content_id, .. } => {
            println!(
                "Recorded feedback {} on {} ({} preference updates)",
                body["event"]["id"].as_str().unwrap_or("?"),
                content_id,
                body["patterns_updated"]
            );
        }
        Commands::Preferences => {
            let prefs: Preferences = serde_json::from_value(body)?;
            print!("{}", format_preferences(&prefs));
        }
        Commands::Adjust { content_id } => {
            println!(
                "{}: adjustment {:+.3}",
                content_id,
                body["adjustment"].as_f64().unwrap_or(0.0)
            );
        }
        Commands::Category { content_id } => {
            println!("{}", content_id);
            println!("Category:   {}", body["category"].as_str().unwrap_or("?"));
            println!("Topic:      {}", body["topic"].as_str().unwrap_or("?"));
            println!("Complexity: {}", body["complexity"].as_str().unwrap_or("?"));
        }
        Commands::Trending { .. } => {
            let resp: TrendingResponse = serde_json::from_value(body)?;
            print!("{}", format_trending(&resp));
        }
        Commands::Recommend { .. } => {
            let resp: RecommendationsResponse = serde_json::from_value(body)?;
            print!("{}", format_recommendations(&resp.results));
        }
        Commands::Stats => {
            let stats: FeedbackStats = serde_json::from_value(body)?;
            print!("{}", format_stats(&stats));
        }
        Commands::Status => {
            println!("Prism server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Backend:      {}", body["backend"].as_str().unwrap_or("?"));
            println!("Socket:       {}", body["socket"].as_str().unwrap_or("?"));
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("prism-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    // ========================================================================
    // TEST 1: argument definitions are consistent
    // ========================================================================
    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    // ========================================================================
    // TEST 2: feedback subcommand parses type, rating and global --json
    // ========================================================================
    #[test]
    fn test_parse_feedback() {
        let cli = Cli::try_parse_from([
            "prism-cli", "feedback", "p1", "--type", "gold", "--rating", "5", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Feedback { content_id, feedback_type, rating, notes } => {
                assert_eq!(content_id, "p1");
                assert_eq!(feedback_type.as_deref(), Some("gold"));
                assert_eq!(rating, Some(5));
                assert!(notes.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    // ========================================================================
    // TEST 3: preferences render strongest first, dimension suffix dropped
    // ========================================================================
    #[test]
    fn test_format_preferences() {
        let prefs: Preferences = serde_json::from_value(serde_json::json!({
            "author_preference": {
                "bob": {"score": -0.5, "confidence": 0.3, "sample_size": 3},
                "alice": {"score": 0.9, "confidence": 0.5, "sample_size": 5}
            },
            "tag_preference": {}
        }))
        .unwrap();

        let text = format_preferences(&prefs);
        assert!(text.starts_with("author:\n"));
        assert!(text.find("alice").unwrap() < text.find("bob").unwrap());
        assert!(!text.contains("tag"));
        assert!(text.contains("+0.90"));
    }

    // ========================================================================
    // TEST 4: empty preferences explain the confidence gate
    // ========================================================================
    #[test]
    fn test_format_preferences_empty() {
        let text = format_preferences(&Preferences::new());
        assert!(text.contains("No known preferences"));
    }

    // ========================================================================
    // TEST 5: trending rendering
    // ========================================================================
    #[test]
    fn test_format_trending() {
        let resp: TrendingResponse = serde_json::from_value(serde_json::json!({
            "window_days": 30,
            "count": 1,
            "items": [{"name": "llm", "kind": "tag", "count": 3, "avg_score": 8.0, "trending_score": 24.0}]
        }))
        .unwrap();
        let text = format_trending(&resp);
        assert!(text.starts_with("Trending (last 30 days)"));
        assert!(text.contains(" 1. llm"));
        assert!(text.contains("score 24.0"));

        let empty = TrendingResponse { window_days: 7, items: vec![] };
        assert_eq!(format_trending(&empty), "Nothing trending in the last 7 days.");
    }

    // ========================================================================
    // TEST 6: recommendations show final, base and signed adjustment
    // ========================================================================
    #[test]
    fn test_format_recommendations() {
        let recs = vec![Recommendation {
            id: "p1".into(),
            title: "T".repeat(100),
            author: None,
            base_value_score: 7.0,
            adjustment: -0.3,
            final_score: 6.7,
        }];
        let text = format_recommendations(&recs);
        assert!(text.contains("6.7 (7.0 -0.30)"));
        assert!(text.contains(&"T".repeat(60)));
        assert!(!text.contains(&"T".repeat(61)));
        assert!(text.contains("by unknown"));
    }

    // ========================================================================
    // TEST 7: stats rendering skips empty top lists
    // ========================================================================
    #[test]
    fn test_format_stats() {
        let stats: FeedbackStats = serde_json::from_value(serde_json::json!({
            "total_feedback": 4,
            "feedback_by_type": {"gold": 3, "rating_only": 1},
            "gold_posts": 2,
            "top_authors": [{"key": "alice", "score": 0.8, "confidence": 0.4, "sample_size": 4}],
            "top_topics": []
        }))
        .unwrap();
        let text = format_stats(&stats);
        assert!(text.contains("Total feedback: 4"));
        assert!(text.contains("rating_only"));
        assert!(text.contains("Top authors:"));
        assert!(!text.contains("Top topics:"));
    }

    // ========================================================================
    // TEST 8: content ids are encoded as a single path segment
    // ========================================================================
    #[test]
    fn test_endpoint_encodes_segments() {
        let base = Url::parse("http://127.0.0.1:8767/").unwrap();
        let url = endpoint(&base, &["content", "a/b?c#d", "adjustment"], &[]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8767/content/a%2Fb%3Fc%23d/adjustment");

        let url = endpoint(&base, &["trending"], &[("days", "7".to_string())]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8767/trending?days=7");

        let prefixed = Url::parse("http://host/api").unwrap();
        let url = endpoint(&prefixed, &["health"], &[]).unwrap();
        assert_eq!(url.as_str(), "http://host/api/health");

        assert!(endpoint(&Url::parse("mailto:x@y").unwrap(), &["health"], &[]).is_err());
    }
}
