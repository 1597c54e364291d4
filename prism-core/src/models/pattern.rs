use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::PrismError;

/// An axis of personalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    #[serde(rename = "author_preference")]
    Author,
    #[serde(rename = "topic_preference")]
    Topic,
    #[serde(rename = "content_type_preference")]
    ContentType,
    #[serde(rename = "tag_preference")]
    Tag,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Author,
        Dimension::Topic,
        Dimension::ContentType,
        Dimension::Tag,
    ];

    /// Persisted `pattern_type` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Author => "author_preference",
            Dimension::Topic => "topic_preference",
            Dimension::ContentType => "content_type_preference",
            Dimension::Tag => "tag_preference",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches("_preference") {
            "author" => Ok(Dimension::Author),
            "topic" => Ok(Dimension::Topic),
            "content_type" => Ok(Dimension::ContentType),
            "tag" => Ok(Dimension::Tag),
            other => Err(PrismError::InvalidArgument(format!(
                "unknown preference dimension '{}'",
                other
            ))),
        }
    }
}

/// Running preference estimate for one (dimension, key).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferencePattern {
    pub dimension: Dimension,
    pub pattern_key: String,
    pub preference_score: f64,
    pub confidence: f64,
    pub sample_size: u32,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PreferenceSummary {
    pub score: f64,
    pub confidence: f64,
    pub sample_size: u32,
}

impl PreferenceSummary {
    /// Confidence-weighted score, the unit the score adjuster sums.
    pub fn weighted(&self) -> f64 {
        self.score * self.confidence
    }
}

impl From<&PreferencePattern> for PreferenceSummary {
    fn from(p: &PreferencePattern) -> Self {
        Self {
            score: p.preference_score,
            confidence: p.confidence,
            sample_size: p.sample_size,
        }
    }
}

/// Known preferences grouped by dimension, keyed by pattern key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct UserPreferences(pub BTreeMap<Dimension, BTreeMap<String, PreferenceSummary>>);

impl UserPreferences {
    /// Keep only patterns whose confidence is strictly above `threshold`.
    pub fn from_patterns<'a, I>(patterns: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = &'a PreferencePattern>,
    {
        let mut map: BTreeMap<Dimension, BTreeMap<String, PreferenceSummary>> = BTreeMap::new();
        for pattern in patterns.into_iter().filter(|p| p.confidence > threshold) {
            map.entry(pattern.dimension)
                .or_default()
                .insert(pattern.pattern_key.clone(), PreferenceSummary::from(pattern));
        }
        Self(map)
    }

    pub fn get(&self, dimension: Dimension, key: &str) -> Option<&PreferenceSummary> {
        self.0.get(&dimension).and_then(|m| m.get(key))
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&BTreeMap<String, PreferenceSummary>> {
        self.0.get(&dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(dimension: Dimension, key: &str, score: f64, confidence: f64) -> PreferencePattern {
        PreferencePattern {
            dimension,
            pattern_key: key.to_string(),
            preference_score: score,
            confidence,
            sample_size: (confidence * 10.0).round() as u32,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_dimension_parse_accepts_short_and_long_names() {
        for dim in Dimension::ALL {
            assert_eq!(dim.as_str().parse::<Dimension>().unwrap(), dim);
        }
        assert_eq!("content_type".parse::<Dimension>().unwrap(), Dimension::ContentType);
        assert!("mood".parse::<Dimension>().is_err());
    }

    #[test]
    fn test_user_preferences_threshold_is_strict() {
        let patterns = vec![
            pattern(Dimension::Author, "alice", 0.9, 0.3),
            pattern(Dimension::Author, "bob", 0.9, 0.2),
            pattern(Dimension::Tag, "llm", -0.5, 0.5),
        ];
        let prefs = UserPreferences::from_patterns(&patterns, 0.2);

        assert!(prefs.get(Dimension::Author, "alice").is_some());
        assert!(prefs.get(Dimension::Author, "bob").is_none());
        assert_eq!(prefs.get(Dimension::Tag, "llm").unwrap().score, -0.5);
        assert!(prefs.dimension(Dimension::Topic).is_none());
    }

    #[test]
    fn test_user_preferences_serialize_with_dimension_names() {
        let patterns = vec![pattern(Dimension::Author, "alice", 1.0, 0.3)];
        let prefs = UserPreferences::from_patterns(&patterns, 0.2);
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["author_preference"]["alice"]["score"], 1.0);
    }
}
