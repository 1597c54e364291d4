use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendKind {
    Tag,
    Topic,
}

/// One entry of the trending ranking. `trending_score = count * avg_score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingItem {
    pub name: String,
    pub kind: TrendKind,
    pub count: usize,
    pub avg_score: f64,
    pub trending_score: f64,
}
