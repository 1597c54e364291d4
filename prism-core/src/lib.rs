pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod learning;
pub mod models;
pub mod organizer;
pub mod scoring;
pub mod store;

pub use config::PrismConfig;
pub use error::{PrismError, Result};
pub use models::{
    ContentFilter, ContentRecord, Dimension, FeedbackEvent, FeedbackType, NewFeedback,
    PreferencePattern, TrendKind, TrendingItem,
};
pub use store::{MemoryStore, PgStore, Store};
