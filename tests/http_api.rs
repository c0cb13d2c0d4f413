//! HTTP 接口集成测试

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use notelingo::config::AppConfig;
use notelingo::web::create_router;
use notelingo::Application;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::fixed_translator;

fn test_app() -> (Router, Application) {
    let app = Application::build(&AppConfig::default(), fixed_translator("Bonjour")).unwrap();
    (create_router(app.app_state()), app)
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create(router: &Router, title: &str) -> Value {
    let (status, note) = send(
        router,
        "POST",
        "/api/notes",
        Some(json!({"title": title, "original_text": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    note
}

#[tokio::test]
async fn test_create_and_get_note() {
    let (router, _app) = test_app();

    let created = create(&router, "T").await;
    assert_eq!(created["original_language"], "en");
    assert_eq!(created["translated_text"], Value::Null);
    assert_eq!(created["translated_language"], Value::Null);

    let uri = format!("/api/notes/{}", created["id"]);
    let (status, fetched) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_list_newest_first() {
    let (router, _app) = test_app();
    create(&router, "first").await;
    create(&router, "second").await;

    let (status, list) = send(&router, "GET", "/api/notes", None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["second", "first"]);
}

#[tokio::test]
async fn test_update_and_delete() {
    let (router, _app) = test_app();
    let created = create(&router, "T").await;
    let uri = format!("/api/notes/{}", created["id"]);

    // 客户端提交的译文字段被忽略
    let (status, patched) = send(
        &router,
        "PATCH",
        &uri,
        Some(json!({"title": "Renamed", "translated_text": "hack"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["title"], "Renamed");
    assert_eq!(patched["translated_text"], Value::Null);

    let (status, replaced) = send(
        &router,
        "PUT",
        &uri,
        Some(json!({"title": "Whole", "original_text": "Hola", "original_language": "es"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replaced["original_language"], "es");

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_note_is_bad_request() {
    let (router, _app) = test_app();
    let (status, body) = send(
        &router,
        "POST",
        "/api/notes",
        Some(json!({"title": "   ", "original_text": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "title may not be blank.");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let (router, _app) = test_app();

    let (status, body) = send(&router, "POST", "/api/notes", Some(json!({"title": "T"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("original_text"));

    let (status, body) = send(
        &router,
        "POST",
        "/api/notes",
        Some(json!({"title": 5, "original_text": "Hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let created = create(&router, "T").await;
    let uri = format!("/api/notes/{}", created["id"]);
    let request = Request::builder()
        .method("PATCH")
        .uri(&uri)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());

    let (status, _) = send(&router, "PUT", &uri, Some(json!({"title": "only"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_durable_storage_through_router() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.storage.path = Some(dir.path().join("notes.redb"));

    let app = Application::build(&config, fixed_translator("x")).unwrap();
    let router = create_router(app.app_state());

    let created = create(&router, "Saved").await;
    let uri = format!("/api/notes/{}", created["id"]);
    let (status, fetched) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Saved");

    let (status, _) = send(&router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_translate_accepted_and_rejected() {
    let (router, _app) = test_app();
    let created = create(&router, "T").await;
    let uri = format!("/api/notes/{}/translate", created["id"]);

    let (status, body) = send(&router, "POST", &uri, Some(json!({"target_language": "fr"}))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Translation task started.");

    let (status, body) = send(&router, "POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Target language not provided.");

    let (status, body) = send(&router, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Target language not provided.");

    let (status, _) = send(
        &router,
        "POST",
        "/api/notes/999/translate",
        Some(json!({"target_language": "fr"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_translation_visible_after_worker_runs() {
    let (router, app) = test_app();
    let created = create(&router, "T").await;
    let id = created["id"].as_u64().unwrap();

    let (service, workers) = app.spawn_workers(async {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    });
    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/notes/{}/translate", id),
        Some(json!({"target_language": "fr"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    workers.await.unwrap();

    let note = service.read_note(id).unwrap();
    assert_eq!(note.translated_text(), Some("Bonjour"));

    let (_, fetched) = send(&router, "GET", &format!("/api/notes/{}", id), None).await;
    assert_eq!(fetched["translated_text"], "Bonjour");
    assert_eq!(fetched["translated_language"], "fr");
}

#[tokio::test]
async fn test_stats_and_health() {
    let (router, _app) = test_app();
    let created = create(&router, "T").await;
    let uri = format!("/api/notes/{}", created["id"]);
    send(&router, "GET", &uri, None).await;
    send(&router, "GET", &uri, None).await;

    let (status, stats) = send(&router, "GET", "/api/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["cache"]["hits"], 1);
    assert_eq!(stats["cache"]["misses"], 1);
    assert_eq!(stats["service"]["notes_created"], 1);
    assert!(stats["dead_letters"].as_array().unwrap().is_empty());

    let (status, health) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_queue_full_is_service_unavailable() {
    let mut config = AppConfig::default();
    config.worker.queue_capacity = 1;
    let app = Application::build(&config, fixed_translator("x")).unwrap();
    let router = create_router(app.app_state());

    let created = create(&router, "T").await;
    let uri = format!("/api/notes/{}/translate", created["id"]);
    let body = Some(json!({"target_language": "fr"}));

    let (status, _) = send(&router, "POST", &uri, body.clone()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let (status, _) = send(&router, "POST", &uri, body).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    drop(app);
}
