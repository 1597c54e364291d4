//! HTTP integration tests for the Prism REST API
//!
//! Full handler dispatch through the Axum router with `oneshot`, backed by the
//! in-memory store so no database is needed.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use prism_core::{ContentRecord, MemoryStore, PrismConfig, Store};
use prism_server::http::{build_router, HttpState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn make_app() -> (Router, Arc<dyn Store>) {
    let store: Arc<dyn Store> = Arc::new(
        MemoryStore::with_records([
            ContentRecord::new("p1", 8.0)
                .with_author("alice")
                .with_topic("AI")
                .with_content_type("Tool")
                .with_tags(["llm"])
                .with_content("An open source LLM chatbot for your terminal"),
            ContentRecord::new("p2", 6.0)
                .with_author("alice")
                .with_content_type("Tutorial")
                .with_content("Getting started with Docker"),
        ])
        .await,
    );
    let state = Arc::new(HttpState {
        store: store.clone(),
        config: PrismConfig::in_memory(),
    });
    (build_router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

// ===========================================================================
// TEST 1: GET /health and /version
// ===========================================================================
#[tokio::test]
async fn test_health_and_version() {
    let (app, _) = make_app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");

    let (status, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "prism/1");
}

// ===========================================================================
// TEST 2: POST /feedback: success writes event and back-fills the record
// ===========================================================================
#[tokio::test]
async fn test_post_feedback_success() {
    let (app, store) = make_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"content_id": "p1", "feedback_type": "Gold", "rating": 5, "notes": "great"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert!(body["event"]["id"].is_string());
    assert_eq!(body["event"]["feedback_type"], "gold");
    assert_eq!(body["patterns_updated"], 4);

    let record = store.get_content_record("p1").await.unwrap().unwrap();
    assert!(record.is_gold);
    assert_eq!(record.user_rating, Some(5));

    let (status, body) = send(&app, "GET", "/feedback/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["notes"], "great");
}

// ===========================================================================
// TEST 3: POST /feedback: error statuses
// ===========================================================================
#[tokio::test]
async fn test_post_feedback_errors() {
    let (app, store) = make_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"content_id": "ghost", "feedback_type": "good"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/feedback", Some(json!({"content_id": "p1", "rating": 9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/feedback", Some(json!({"content_id": "p1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/feedback",
        Some(json!({"content_id": "p1", "feedback_type": "superb"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(store.list_feedback_events(None).await.unwrap().is_empty());
}

// ===========================================================================
// TEST 4: preferences, adjustment and replay
// ===========================================================================
#[tokio::test]
async fn test_preferences_adjustment_and_replay() {
    let (app, _) = make_app().await;

    for _ in 0..3 {
        let (status, _) = send(
            &app,
            "POST",
            "/feedback",
            Some(json!({"content_id": "p1", "feedback_type": "gold"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, prefs) = send(&app, "GET", "/preferences", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prefs["author_preference"]["alice"]["sample_size"], 3);
    assert_eq!(prefs["tag_preference"]["llm"]["score"], 1.0);

    let (status, body) = send(&app, "GET", "/content/p2/adjustment", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["adjustment"].as_f64().unwrap() > 0.0);

    let (status, _) = send(&app, "GET", "/content/nope/adjustment", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = send(&app, "POST", "/preferences/replay", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["events_replayed"], 3);

    let (_, after) = send(&app, "GET", "/preferences", None).await;
    assert_eq!(prefs, after);
}

// ===========================================================================
// TEST 5: content upsert, categorization and organizer views
// ===========================================================================
#[tokio::test]
async fn test_content_and_organizer_views() {
    let (app, _) = make_app().await;

    let record = ContentRecord::new("p3", 7.5)
        .with_author("carol")
        .with_content_type("App")
        .with_tags(["design"])
        .with_content("A Figma plugin that exports UI mockups");
    let (status, body) = send(&app, "POST", "/content", Some(serde_json::to_value(&record).unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "Design & Visual");

    let (status, body) = send(&app, "GET", "/content/p1/category", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], "AI & Machine Learning");
    assert_eq!(body["topic"], "AI");

    let (status, body) = send(&app, "GET", "/trending?days=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window_days"], 7);
    assert!(body["items"].as_array().unwrap().iter().any(|i| i["name"] == "llm"));

    let (status, body) = send(&app, "GET", "/trending?days=4000000000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().iter().any(|i| i["name"] == "llm"));

    let (status, body) = send(&app, "GET", "/recommendations?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["id"], "p1");

    let (status, body) = send(&app, "GET", "/collections", None).await;
    assert_eq!(status, StatusCode::OK);
    let tools = body["tools_by_category"].as_array().unwrap();
    assert_eq!(tools.len(), 2);

    let (status, body) = send(&app, "GET", "/export/markdown", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["markdown"].as_str().unwrap().contains("## Tools by Category"));
}

// ===========================================================================
// TEST 6: GET /feedback/stats
// ===========================================================================
#[tokio::test]
async fn test_feedback_stats_endpoint() {
    let (app, _) = make_app().await;

    send(&app, "POST", "/feedback", Some(json!({"content_id": "p1", "feedback_type": "gold"}))).await;
    send(&app, "POST", "/feedback", Some(json!({"content_id": "p2", "rating": 4}))).await;

    let (status, body) = send(&app, "GET", "/feedback/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_feedback"], 2);
    assert_eq!(body["feedback_by_type"]["gold"], 1);
    assert_eq!(body["feedback_by_type"]["rating_only"], 1);
    assert_eq!(body["gold_posts"], 1);
}
