//! Conversation session: the state machine bridging local capture/playback
//! with a remote conversational-AI engine.
//!
//! A [`ConversationSession`] owns exactly one duplex connection to the
//! engine. Control messages ride as JSON text frames, locally captured audio
//! as raw binary frames. The session enforces the delayed-start protocol
//! (nothing reaches the engine before it is listening) and converts the
//! engine's base64 PCM16 audio frames before handing them to the
//! application.
//!
//! All state mutation happens inside a single driver task; the public handle
//! only enqueues commands and observes state over a watch channel, which is
//! what makes `stop()` safe from any task and immune to deadlocking on an
//! in-flight send.

mod driver;
mod engine;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use crate::core::error::SessionResult;
use crate::core::scheduler::DEFAULT_GRACE_MS;

use driver::{Command, SessionDriver};
use engine::EngineConnection;

const COMMAND_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// User id reported to the engine when the caller does not supply one.
pub const DEFAULT_USER_ID: &str = "default_user";

// =============================================================================
// Public Types
// =============================================================================

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet dialing
    Created,
    /// Transport handshake in progress
    Connecting,
    /// Engine acknowledged; start countdown running
    AwaitingStart,
    /// Engine is listening; audio and text flow
    Active,
    /// Ended on purpose, by either side
    Ended,
    /// Transport or fatal error
    Failed,
}

impl SessionState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Created => write!(f, "created"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::AwaitingStart => write!(f, "awaiting_start"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ended => write!(f, "ended"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Configuration for one conversation session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Engine WebSocket address (ws:// or wss://)
    pub engine_url: String,
    /// Bearer token for the engine handshake, if the engine requires one
    pub api_key: Option<String>,
    /// User id sent with the automatic `start` when the countdown fires
    pub user_id: String,
    /// Grace period between engine acknowledgment and the `start` message
    pub grace: Duration,
}

impl SessionConfig {
    pub fn new(engine_url: impl Into<String>) -> Self {
        Self {
            engine_url: engine_url.into(),
            api_key: None,
            user_id: DEFAULT_USER_ID.to_string(),
            grace: Duration::from_millis(DEFAULT_GRACE_MS),
        }
    }
}

/// One decoded engine audio frame.
#[derive(Debug, Clone)]
pub struct EngineAudio {
    /// Validated little-endian 16-bit PCM, mono
    pub pcm: Bytes,
    /// Declared sample rate, defaulted to 24000 when the engine omitted it
    pub sample_rate_hz: u32,
}

/// Lifecycle and media events emitted by a session.
///
/// Events are advisory: the state machine never depends on their
/// consumption, and a backed-up receiver loses events rather than stalling
/// the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Engine acknowledged the session
    Created {
        /// Engine-side session identifier
        engine_session_id: String,
        /// Engine greeting
        message: String,
    },
    /// Start countdown display update
    Countdown {
        /// Milliseconds until the automatic start
        remaining_ms: u64,
    },
    /// Conversation is live
    Started {
        /// Human-readable confirmation
        message: String,
    },
    /// Agent speech transcript
    AgentTranscript { text: String },
    /// User speech transcript
    UserTranscript { text: String },
    /// One decoded engine audio frame
    Audio(EngineAudio),
    /// Conversation is over
    Ended {
        /// Human-readable reason
        message: String,
    },
    /// Something went wrong; fatal errors accompany the FAILED state
    Error { message: String, fatal: bool },
}

// =============================================================================
// Session Handle
// =============================================================================

/// Handle to a running conversation session.
///
/// Cheap to share behind an `Arc`; all methods are safe from any task.
pub struct ConversationSession {
    id: String,
    created_at: DateTime<Utc>,
    user_id: String,
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
}

impl ConversationSession {
    /// Create a session: dial the engine and spawn the driver.
    ///
    /// Fails with a connection error when the transport cannot be
    /// established. On success the session is in CONNECTING and advances to
    /// AWAITING_START once the engine acknowledges with `session_created`.
    pub async fn create(
        config: SessionConfig,
    ) -> SessionResult<(Self, mpsc::Receiver<SessionEvent>)> {
        let id = uuid::Uuid::new_v4().to_string();
        let (connection, read) =
            EngineConnection::connect(&config.engine_url, config.api_key.as_deref()).await?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Created);

        let handle = Self {
            id: id.clone(),
            created_at: Utc::now(),
            user_id: config.user_id.clone(),
            cmd_tx,
            state_rx,
        };

        let driver = SessionDriver::new(id, config, connection, read, cmd_rx, event_tx, state_tx);
        tokio::spawn(driver.run());

        Ok((handle, event_rx))
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// User id this session reports to the engine by default.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state changes.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Whether audio submission currently reaches the engine.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Start the conversation now instead of waiting out the countdown.
    ///
    /// Only meaningful in AWAITING_START; a no-op in any other state, since
    /// the countdown may already have fired.
    pub async fn request_start(&self, user_id: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(Command::RequestStart {
                user_id: user_id.into(),
            })
            .await;
    }

    /// Submit one locally captured audio frame, fire-and-forget.
    ///
    /// Frames submitted while the session is not ACTIVE are dropped, never
    /// buffered. Accepted frames reach the engine unmodified and in
    /// submission order.
    pub async fn submit_local_audio(&self, frame: Bytes) {
        let _ = self.cmd_tx.send(Command::SubmitAudio(frame)).await;
    }

    /// Submit textual input in place of audio. Delivered only while ACTIVE.
    pub async fn submit_local_text(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::SubmitText(text.into())).await;
    }

    /// Stop the session.
    ///
    /// Idempotent and safe from any task. When this returns the session has
    /// reached a terminal state and no further frames will be sent to the
    /// engine.
    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(Command::Stop).await;
        let mut state_rx = self.state_rx.clone();
        // Err here means the driver is gone, which is itself terminal.
        let _ = state_rx.wait_for(|state| state.is_terminal()).await;
    }
}
