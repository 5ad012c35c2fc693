//! Conversation WebSocket handler
//!
//! Bridges a browser connection to its own engine session. Each accepted
//! socket dials the configured engine, relays control messages and capture
//! audio inbound, and fans session events back out as JSON.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use base64::prelude::*;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::session::{ConversationSession, SessionConfig, SessionEvent};
use crate::state::AppState;

use super::messages::{ClientBound, ClientMessage, ConversationRoute, MAX_CAPTURE_FRAME_SIZE};

/// Channel buffer size for the sender task
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (2 MB)
const MAX_WS_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Maximum WebSocket message size (2 MB)
const MAX_WS_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Query parameters accepted by the conversation endpoint
#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    /// User id for the engine; the configured default applies when absent
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Conversation WebSocket handler
///
/// Upgrades the HTTP connection and starts one conversation session against
/// the configured engine for its lifetime.
pub async fn conversation_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConversationParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(user_id = ?params.user_id, "Conversation WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_conversation_socket(socket, state, params))
}

/// Handle one conversation WebSocket connection
async fn handle_conversation_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    params: ConversationParams,
) {
    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<ConversationRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let result = match route {
                ConversationRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                ConversationRoute::Close => {
                    info!("Closing conversation WebSocket connection");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let user_id = params
        .user_id
        .unwrap_or_else(|| app_state.config.default_user_id.clone());

    let mut session_config = SessionConfig::new(app_state.config.engine_ws_url.clone());
    session_config.user_id = user_id.clone();
    session_config.api_key = app_state.config.engine_api_key.clone();
    session_config.grace = app_state.config.start_grace();

    let (session, mut events) = match ConversationSession::create(session_config).await {
        Ok(pair) => pair,
        Err(e) => {
            warn!("Failed to establish engine session: {}", e);
            let _ = route_tx
                .send(ConversationRoute::Outgoing(ClientBound::error(
                    e.to_string(),
                )))
                .await;
            let _ = route_tx.send(ConversationRoute::Close).await;
            let _ = sender_task.await;
            return;
        }
    };

    let session_id = session.id().to_string();
    app_state.register_session(&session_id, &user_id, session.state_changes());
    info!(session_id = %session_id, user_id = %user_id, "Conversation session created");

    loop {
        select! {
            maybe_msg = receiver.next() => match maybe_msg {
                Some(Ok(msg)) => {
                    if !process_client_message(msg, &session, &route_tx).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(session_id = %session_id, "Conversation WebSocket error: {}", e);
                    break;
                }
                None => {
                    info!(session_id = %session_id, "Conversation WebSocket closed by client");
                    break;
                }
            },
            maybe_event = events.recv() => match maybe_event {
                Some(event) => {
                    let terminal = matches!(
                        event,
                        SessionEvent::Ended { .. } | SessionEvent::Error { fatal: true, .. }
                    );
                    forward_session_event(event, &session_id, &route_tx).await;
                    if terminal {
                        break;
                    }
                }
                None => {
                    debug!(session_id = %session_id, "Session event stream ended");
                    break;
                }
            },
        }
    }

    // Cleanup: stop the session, flush whatever it still emitted, close.
    session.stop().await;
    while let Ok(event) = events.try_recv() {
        forward_session_event(event, &session_id, &route_tx).await;
    }
    let _ = route_tx.send(ConversationRoute::Close).await;
    let _ = sender_task.await;

    app_state.unregister_session(&session_id);
    info!(session_id = %session_id, "Conversation WebSocket connection terminated");
}

/// Process one incoming client message. Returns false when the connection
/// should wind down.
async fn process_client_message(
    msg: Message,
    session: &ConversationSession,
    route_tx: &mpsc::Sender<ConversationRoute>,
) -> bool {
    match msg {
        Message::Text(text) => {
            let incoming: ClientMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    let _ = route_tx
                        .send(ConversationRoute::Outgoing(ClientBound::error(format!(
                            "Invalid message format: {e}"
                        ))))
                        .await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                warn!("Message validation failed: {}", e);
                let _ = route_tx
                    .send(ConversationRoute::Outgoing(ClientBound::error(
                        e.to_string(),
                    )))
                    .await;
                return true;
            }

            match incoming {
                ClientMessage::Start { user_id } => {
                    let user_id = user_id.unwrap_or_else(|| session.user_id().to_string());
                    session.request_start(user_id).await;
                    true
                }
                ClientMessage::Stop => {
                    session.stop().await;
                    false
                }
                ClientMessage::Text { text } => {
                    session.submit_local_text(text).await;
                    true
                }
                ClientMessage::Unknown => {
                    let _ = route_tx
                        .send(ConversationRoute::Outgoing(ClientBound::error(
                            "Unknown message type",
                        )))
                        .await;
                    true
                }
            }
        }
        Message::Binary(frame) => {
            if frame.len() > MAX_CAPTURE_FRAME_SIZE {
                warn!("Dropping oversized capture frame: {} bytes", frame.len());
                let _ = route_tx
                    .send(ConversationRoute::Outgoing(ClientBound::error(
                        "Audio frame too large",
                    )))
                    .await;
                return true;
            }
            if session.is_active() {
                session.submit_local_audio(frame).await;
            } else {
                debug!("Session not active, dropping capture frame");
            }
            true
        }
        Message::Close(_) => false,
        // Ping/Pong are answered by the protocol layer
        _ => true,
    }
}

/// Map one session event onto the client wire.
async fn forward_session_event(
    event: SessionEvent,
    session_id: &str,
    route_tx: &mpsc::Sender<ConversationRoute>,
) {
    let outgoing = match event {
        SessionEvent::Created { message, .. } => ClientBound::SessionCreated {
            session_id: session_id.to_string(),
            message,
        },
        SessionEvent::Countdown { remaining_ms } => ClientBound::Countdown { remaining_ms },
        SessionEvent::Started { message } => ClientBound::ConversationStarted { message },
        SessionEvent::AgentTranscript { text } => ClientBound::AgentResponse { transcript: text },
        SessionEvent::UserTranscript { text } => ClientBound::UserTranscript { transcript: text },
        SessionEvent::Audio(audio) => ClientBound::Audio {
            audio_data: BASE64_STANDARD.encode(&audio.pcm),
            sample_rate_hz: audio.sample_rate_hz,
            encoding: "pcm16",
        },
        SessionEvent::Ended { message } => ClientBound::ConversationEnded { message },
        SessionEvent::Error { message, .. } => ClientBound::error(message),
    };
    let _ = route_tx.send(ConversationRoute::Outgoing(outgoing)).await;
}
