use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::PrismError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Gold,
    Good,
    Poor,
    Irrelevant,
}

impl FeedbackType {
    pub const ALL: [FeedbackType; 4] = [
        FeedbackType::Gold,
        FeedbackType::Good,
        FeedbackType::Poor,
        FeedbackType::Irrelevant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Gold => "gold",
            FeedbackType::Good => "good",
            FeedbackType::Poor => "poor",
            FeedbackType::Irrelevant => "irrelevant",
        }
    }
}

impl fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackType {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gold" => Ok(FeedbackType::Gold),
            "good" => Ok(FeedbackType::Good),
            "poor" => Ok(FeedbackType::Poor),
            "irrelevant" => Ok(FeedbackType::Irrelevant),
            other => Err(PrismError::InvalidArgument(format!(
                "unknown feedback type '{}'",
                other
            ))),
        }
    }
}

/// One entry of the append-only feedback log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    pub id: Uuid,
    pub content_id: String,
    pub feedback_type: Option<FeedbackType>,
    pub rating: Option<i32>,
    pub notes: String,
    pub recorded_at: DateTime<Utc>,
}

/// A feedback submission before the server assigns id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewFeedback {
    pub content_id: String,
    pub feedback_type: Option<FeedbackType>,
    pub rating: Option<i32>,
    #[serde(default)]
    pub notes: String,
}

impl NewFeedback {
    pub fn new(content_id: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, feedback_type: FeedbackType) -> Self {
        self.feedback_type = Some(feedback_type);
        self
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Reject submissions that carry no usable signal.
    pub fn validate(&self) -> Result<(), PrismError> {
        if self.content_id.trim().is_empty() {
            return Err(PrismError::InvalidArgument("content_id is required".to_string()));
        }
        if self.feedback_type.is_none() && self.rating.is_none() {
            return Err(PrismError::InvalidArgument(
                "either feedback_type or rating is required".to_string(),
            ));
        }
        if let Some(rating) = self.rating {
            if !(1..=5).contains(&rating) {
                return Err(PrismError::InvalidArgument(format!(
                    "rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }
        Ok(())
    }

    pub fn into_event(self, recorded_at: DateTime<Utc>) -> FeedbackEvent {
        FeedbackEvent {
            id: Uuid::new_v4(),
            content_id: self.content_id,
            feedback_type: self.feedback_type,
            rating: self.rating,
            notes: self.notes,
            recorded_at,
        }
    }
}
