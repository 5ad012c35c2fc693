//! REST API handlers
//!
//! Service info, health, session listing, profile configuration, and the
//! escalation test endpoint.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::escalation::EscalationError;
use crate::state::{AppState, SessionSnapshot};

/// Service info returned from the root endpoint
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    /// Service name
    pub service: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Conversation WebSocket endpoint path
    pub websocket: &'static str,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Number of sessions not yet ended or failed
    pub active_sessions: usize,
}

/// Response for the conversation listing endpoint
#[derive(Debug, Serialize)]
pub struct ConversationsResponse {
    /// Snapshot of every registered session
    pub conversations: Vec<SessionSnapshot>,
}

/// Request body for the escalation test endpoint
#[derive(Debug, Deserialize)]
pub struct TestEmergencyRequest {
    /// Reason forwarded to the webhook
    #[serde(default)]
    pub reason: Option<String>,
}

/// Handler for GET / - service identification
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "voicebridge",
        version: env!("CARGO_PKG_VERSION"),
        websocket: "/ws/conversation",
    })
}

/// Handler for GET /health - liveness plus session count
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_sessions: state.active_session_count(),
    })
}

/// Handler for GET /conversations - list registered sessions
pub async fn list_conversations(State(state): State<Arc<AppState>>) -> Json<ConversationsResponse> {
    Json(ConversationsResponse {
        conversations: state.session_snapshots(),
    })
}

/// Handler for GET /api/get-config - return the stored user profile
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.profiles.load())
}

/// Handler for POST /api/save-config - persist the user profile
pub async fn save_config(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    match state.profiles.save(&profile) {
        Ok(()) => {
            info!("User profile saved");
            Ok(Json(serde_json::json!({ "status": "saved" })))
        }
        Err(e) => {
            error!("Failed to save user profile: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handler for GET /api/scheduled-tasks - tasks due at the current minute
pub async fn scheduled_tasks(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tasks = state.profiles.scheduled_tasks();
    Json(serde_json::json!({ "tasks": tasks }))
}

/// Handler for POST /api/test-emergency - fire the escalation webhook
///
/// Returns 503 when no webhook is configured and 502 when the webhook
/// rejects or cannot be reached.
pub async fn test_emergency(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestEmergencyRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let profile = state.profiles.load();
    let contact = profile
        .get("emergencyContact")
        .cloned()
        .unwrap_or(Value::Null);
    let reason = request
        .reason
        .unwrap_or_else(|| "Manual escalation test".to_string());

    match state.escalation.trigger(contact, &reason).await {
        Ok(status) => {
            info!(status = status, "Escalation webhook accepted test trigger");
            Ok(Json(serde_json::json!({
                "status": "triggered",
                "webhook_status": status,
            })))
        }
        Err(EscalationError::NotConfigured) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "No escalation webhook configured" })),
        )),
        Err(e) => {
            warn!("Escalation test failed: {}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_info_serialization() {
        let info = ServiceInfo {
            service: "voicebridge",
            version: "1.0.0",
            websocket: "/ws/conversation",
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"service\":\"voicebridge\""));
        assert!(json.contains("\"websocket\":\"/ws/conversation\""));
    }

    #[test]
    fn test_health_response_serialization() {
        let health = HealthResponse {
            status: "healthy".to_string(),
            active_sessions: 3,
        };

        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"active_sessions\":3"));
    }

    #[test]
    fn test_emergency_request_defaults() {
        let request: TestEmergencyRequest = serde_json::from_str("{}").unwrap();
        assert!(request.reason.is_none());

        let request: TestEmergencyRequest =
            serde_json::from_str(r#"{"reason": "drill"}"#).unwrap();
        assert_eq!(request.reason.as_deref(), Some("drill"));
    }
}
