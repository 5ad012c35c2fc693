//! Conversation WebSocket route configuration
//!
//! This module configures the WebSocket endpoint that bridges browser
//! clients to the conversational engine.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::conversation::conversation_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the conversation WebSocket router
///
/// # Endpoint
///
/// `GET /ws/conversation` - WebSocket upgrade for one conversation session
///
/// # Protocol
///
/// After the upgrade the server dials the engine and responds with
/// `session_created` once the engine session exists, followed by `countdown`
/// ticks until the conversation starts. Clients may send:
/// 1. `start` to begin immediately instead of waiting out the grace period
/// 2. `text` messages into the conversation
/// 3. Binary capture-audio frames (PCM 16-bit, mono) once started
/// 4. `stop` to end the conversation
///
/// Server responds with:
/// - `conversation_started` when the conversation goes live
/// - `agent_response` / `user_transcript` for transcripts
/// - `audio` for agent speech (base64 PCM 16-bit)
/// - `conversation_ended` when the conversation finishes
/// - `error` on failures
///
/// # Example
///
/// ```json
/// // Server, right after connect
/// {"type": "session_created", "session_id": "...", "message": "..."}
/// {"type": "countdown", "remaining_ms": 10000}
///
/// // Client opts in early
/// {"type": "start"}
///
/// // Server
/// {"type": "conversation_started", "message": "..."}
/// ```
pub fn create_conversation_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/conversation", get(conversation_handler))
        .layer(TraceLayer::new_for_http())
}
