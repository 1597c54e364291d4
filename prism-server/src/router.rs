use crate::subsystems::{feedback, organize, preferences};
use prism_core::ipc::{PrismRequest, PrismResponse};
use prism_core::{NewFeedback, PrismConfig, Result, Store};
use serde::Serialize;

const DEFAULT_RECOMMENDATIONS: usize = 20;

/// Dispatch one request against the store and wrap the outcome in a response envelope.
pub async fn handle_request(
    request: PrismRequest,
    store: &dyn Store,
    config: &PrismConfig,
) -> PrismResponse {
    match dispatch(request, store, config).await {
        Ok(data) => PrismResponse::ok(data),
        Err(e) => {
            tracing::warn!("Request failed: {}", e);
            PrismResponse::from(e)
        }
    }
}

async fn dispatch(
    request: PrismRequest,
    store: &dyn Store,
    config: &PrismConfig,
) -> Result<serde_json::Value> {
    match request {
        PrismRequest::Ping => Ok(serde_json::json!({"pong": true})),
        PrismRequest::Health => {
            let backend = store.health_check().await?;
            Ok(serde_json::json!({
                "status": "healthy",
                "backend": backend,
            }))
        }
        PrismRequest::RecordFeedback {
            content_id,
            feedback_type,
            rating,
            notes,
        } => {
            let request = NewFeedback {
                content_id,
                feedback_type,
                rating,
                notes,
            };
            to_value(feedback::record_feedback(store, config, request).await?)
        }
        PrismRequest::FeedbackFor { content_id } => {
            let events = feedback::feedback_for(store, &content_id).await?;
            Ok(serde_json::json!({
                "content_id": content_id,
                "count": events.len(),
                "events": events,
            }))
        }
        PrismRequest::FeedbackStats => to_value(feedback::feedback_stats(store).await?),
        PrismRequest::GetPreferences => {
            to_value(preferences::get_user_preferences(store, &config.scoring).await?)
        }
        PrismRequest::Replay => to_value(preferences::replay(store, config).await?),
        PrismRequest::GetAdjustment { content_id } => {
            let adjustment =
                preferences::get_score_adjustment(store, &config.scoring, &content_id).await?;
            Ok(serde_json::json!({
                "content_id": content_id,
                "adjustment": adjustment,
            }))
        }
        PrismRequest::Categorize { content_id } => {
            to_value(organize::categorize(store, &content_id).await?)
        }
        PrismRequest::UpsertContent { record } => {
            to_value(organize::upsert_content(store, record).await?)
        }
        PrismRequest::Trending { window_days } => {
            let items = organize::get_trending(store, &config.trending, window_days).await?;
            Ok(serde_json::json!({
                "window_days": window_days.unwrap_or(config.trending.window_days),
                "count": items.len(),
                "items": items,
            }))
        }
        PrismRequest::Recommendations { limit } => {
            let limit = limit.unwrap_or(DEFAULT_RECOMMENDATIONS);
            let ranked = preferences::recommendations(store, &config.scoring, limit).await?;
            Ok(serde_json::json!({
                "count": ranked.len(),
                "results": ranked,
            }))
        }
        PrismRequest::Collections => to_value(organize::collections(store, &config.scoring).await?),
        PrismRequest::ExportMarkdown => {
            let markdown = organize::markdown_export(store).await?;
            Ok(serde_json::json!({ "markdown": markdown }))
        }
    }
}

fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| prism_core::PrismError::Ipc(format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::ipc::ErrorKind;
    use prism_core::{ContentRecord, FeedbackType, MemoryStore};

    #[tokio::test]
    async fn test_ping_pong() {
        let store = MemoryStore::new();
        let resp = handle_request(PrismRequest::Ping, &store, &PrismConfig::in_memory()).await;
        assert!(resp.is_ok());
        assert_eq!(resp.data.unwrap()["pong"], true);
    }

    #[tokio::test]
    async fn test_health_reports_backend() {
        let store = MemoryStore::new();
        let resp = handle_request(PrismRequest::Health, &store, &PrismConfig::in_memory()).await;
        assert_eq!(resp.data.unwrap()["backend"], "memory");
    }

    #[tokio::test]
    async fn test_record_feedback_unknown_record_maps_to_not_found() {
        let store = MemoryStore::new();
        let resp = handle_request(
            PrismRequest::RecordFeedback {
                content_id: "ghost".into(),
                feedback_type: Some(FeedbackType::Gold),
                rating: None,
                notes: String::new(),
            },
            &store,
            &PrismConfig::in_memory(),
        )
        .await;
        assert!(!resp.is_ok());
        assert_eq!(resp.error_kind, Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_preferences_keyed_by_dimension_wire_name() {
        let store = MemoryStore::with_records([ContentRecord::new("p1", 7.0).with_author("alice")]).await;
        let config = PrismConfig::in_memory();
        for _ in 0..3 {
            let resp = handle_request(
                PrismRequest::RecordFeedback {
                    content_id: "p1".into(),
                    feedback_type: Some(FeedbackType::Good),
                    rating: None,
                    notes: String::new(),
                },
                &store,
                &config,
            )
            .await;
            assert!(resp.is_ok(), "{:?}", resp.error);
        }

        let resp = handle_request(PrismRequest::GetPreferences, &store, &config).await;
        let data = resp.data.unwrap();
        let alice = &data["author_preference"]["alice"];
        assert_eq!(alice["sample_size"], 3);
        assert!((alice["confidence"].as_f64().unwrap() - 0.3).abs() < 1e-9);
    }
}
