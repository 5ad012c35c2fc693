//! REST API route tests
//!
//! Exercises the HTTP surface with in-process requests. No listener is
//! bound; requests go straight through the router.

use std::path::PathBuf;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voicebridge::handlers::api::service_info;
use voicebridge::routes::{create_api_router, create_conversation_router};
use voicebridge::{AppState, DEFAULT_USER_ID, ServerConfig};

fn test_config(profile_path: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        engine_ws_url: "ws://127.0.0.1:9/ws/conversation".to_string(),
        engine_api_key: None,
        default_user_id: DEFAULT_USER_ID.to_string(),
        start_grace_ms: 10_000,
        cors_allowed_origins: None,
        profile_path,
        escalation_webhook_url: None,
        escalation_auth_token: None,
    }
}

/// Assemble the app the way `main` does
fn test_app(config: ServerConfig) -> Router {
    let state = AppState::new(config);
    Router::new()
        .route("/", get(service_info))
        .merge(create_api_router())
        .merge(create_conversation_router())
        .with_state(state)
}

async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body was not JSON")
    };
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read_json(response).await
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read_json(response).await
}

/// Test that the root endpoint identifies the service
#[tokio::test]
async fn test_service_info() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, body) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "voicebridge");
    assert_eq!(body["websocket"], "/ws/conversation");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

/// Test that both health paths answer with a zero session count
#[tokio::test]
async fn test_health_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    for uri in ["/health", "/api/health"] {
        let (status, body) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["active_sessions"], 0);
    }
}

/// Test that the conversation listing starts out empty
#[tokio::test]
async fn test_conversations_listing_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, body) = get_json(&app, "/conversations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversations"], json!([]));
}

/// Test that a missing profile file reads back as an empty object
#[tokio::test]
async fn test_get_config_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, body) = get_json(&app, "/api/get-config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

/// Test that a saved profile reads back unchanged
#[tokio::test]
async fn test_config_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let document = json!({
        "userName": "Margaret",
        "emergencyContact": { "name": "Sam", "number": "+15550100" },
        "reminders": [{ "time": "08:00", "text": "Take your pills" }],
    });

    let (status, body) = post_json(&app, "/api/save-config", document.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "saved");

    let (status, body) = get_json(&app, "/api/get-config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, document);
}

/// Test that an unwritable profile location turns into a 500
#[tokio::test]
async fn test_save_config_unwritable_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no-such-dir").join("profile.json");
    let app = test_app(test_config(missing));

    let (status, _) = post_json(&app, "/api/save-config", json!({ "a": 1 })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

/// Test that an empty profile yields no scheduled tasks
#[tokio::test]
async fn test_scheduled_tasks_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, body) = get_json(&app, "/api/scheduled-tasks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tasks"], json!([]));
}

/// Test that the escalation test endpoint refuses when no webhook is set
#[tokio::test]
async fn test_emergency_without_webhook() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, body) = post_json(&app, "/api/test-emergency", json!({})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "No escalation webhook configured");
}

/// Test that the escalation test endpoint forwards the stored contact
#[tokio::test]
async fn test_emergency_triggers_webhook() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(body_partial_json(json!({
            "reason": "monthly drill",
            "emergency_contact": { "name": "Sam" },
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("profile.json"));
    config.escalation_webhook_url = Some(format!("{}/hook", server.uri()));
    let app = test_app(config);

    let (status, _) = post_json(
        &app,
        "/api/save-config",
        json!({ "emergencyContact": { "name": "Sam", "number": "+15550100" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        post_json(&app, "/api/test-emergency", json!({ "reason": "monthly drill" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "triggered");
    assert_eq!(body["webhook_status"], 204);
}

/// Test that a rejecting webhook surfaces as a bad gateway
#[tokio::test]
async fn test_emergency_webhook_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().join("profile.json"));
    config.escalation_webhook_url = Some(server.uri());
    let app = test_app(config);

    let (status, body) = post_json(&app, "/api/test-emergency", json!({})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Escalation webhook returned status 500");
}

/// Test that unknown routes fall through to 404
#[tokio::test]
async fn test_unknown_route() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(test_config(dir.path().join("profile.json")));

    let (status, _) = get_json(&app, "/no-such-route").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
