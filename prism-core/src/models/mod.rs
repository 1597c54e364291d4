mod content;
mod feedback;
mod pattern;
mod trending;

pub use content::{parse_tags, ContentFilter, ContentRecord};
pub use feedback::{FeedbackEvent, FeedbackType, NewFeedback};
pub use pattern::{Dimension, PreferencePattern, PreferenceSummary, UserPreferences};
pub use trending::{TrendKind, TrendingItem};
