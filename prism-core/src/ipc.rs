use serde::{Deserialize, Serialize};

use crate::error::PrismError;
use crate::models::{ContentRecord, FeedbackType};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PrismRequest {
    Ping,
    Health,
    RecordFeedback {
        content_id: String,
        feedback_type: Option<FeedbackType>,
        rating: Option<i32>,
        #[serde(default)]
        notes: String,
    },
    FeedbackFor {
        content_id: String,
    },
    FeedbackStats,
    GetPreferences,
    Replay,
    GetAdjustment {
        content_id: String,
    },
    Categorize {
        content_id: String,
    },
    UpsertContent {
        record: ContentRecord,
    },
    Trending {
        window_days: Option<u32>,
    },
    Recommendations {
        limit: Option<usize>,
    },
    Collections,
    ExportMarkdown,
}

/// Machine-readable error class carried alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    StorageUnavailable,
    Internal,
}

impl From<&PrismError> for ErrorKind {
    fn from(err: &PrismError) -> Self {
        match err {
            PrismError::NotFound(_) => ErrorKind::NotFound,
            PrismError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PrismError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PrismResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    pub version: String,
}

impl PrismResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self::err_kind(ErrorKind::Internal, msg)
    }

    pub fn err_kind(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

impl From<PrismError> for PrismResponse {
    fn from(err: PrismError) -> Self {
        Self::err_kind(ErrorKind::from(&err), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tagged_by_action() {
        let req: PrismRequest = serde_json::from_value(serde_json::json!({
            "action": "record_feedback",
            "content_id": "p1",
            "feedback_type": "gold",
            "rating": 5
        }))
        .unwrap();
        match req {
            PrismRequest::RecordFeedback { content_id, feedback_type, rating, notes } => {
                assert_eq!(content_id, "p1");
                assert_eq!(feedback_type, Some(FeedbackType::Gold));
                assert_eq!(rating, Some(5));
                assert!(notes.is_empty());
            }
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn test_unknown_feedback_type_rejected() {
        let res: Result<PrismRequest, _> = serde_json::from_value(serde_json::json!({
            "action": "record_feedback",
            "content_id": "p1",
            "feedback_type": "amazing"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn test_msgpack_roundtrip_of_request() {
        let bytes = rmp_serde::to_vec_named(&PrismRequest::Trending { window_days: Some(7) }).unwrap();
        let back: PrismRequest = rmp_serde::from_slice(&bytes).unwrap();
        assert!(matches!(back, PrismRequest::Trending { window_days: Some(7) }));
    }

    #[test]
    fn test_error_response_carries_kind() {
        let resp = PrismResponse::from(PrismError::NotFound("content record 'x'".into()));
        assert!(!resp.is_ok());
        assert_eq!(resp.error_kind, Some(ErrorKind::NotFound));
        assert!(resp.error.unwrap().contains("'x'"));
    }
}
