//! Conversation WebSocket message types
//!
//! Wire shapes for the browser side of the bridge. Control messages are
//! JSON text frames; locally captured audio arrives as raw binary frames
//! and is never wrapped in JSON.

use serde::{Deserialize, Serialize};

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Maximum allowed size for one capture audio frame (1 MB)
pub const MAX_CAPTURE_FRAME_SIZE: usize = 1024 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the client
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Start the conversation before the countdown fires
    #[serde(rename = "start")]
    Start {
        /// User id for the engine; the server default applies when absent
        #[serde(default)]
        user_id: Option<String>,
    },

    /// Stop the conversation
    #[serde(rename = "stop")]
    Stop,

    /// Send text input instead of audio
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },

    /// Anything this server does not understand; answered with an error
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Validate size limits on client-supplied payloads.
    pub fn validate_size(&self) -> Result<(), ConversationValidationError> {
        if let ClientMessage::Text { text } = self {
            if text.len() > MAX_TEXT_SIZE {
                return Err(ConversationValidationError::TextTooLarge {
                    size: text.len(),
                    max: MAX_TEXT_SIZE,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Outgoing WebSocket messages to the client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientBound {
    /// Session established; countdown begins shortly
    #[serde(rename = "session_created")]
    SessionCreated {
        /// Bridge session id
        session_id: String,
        /// Greeting for display
        message: String,
    },

    /// Time left until the automatic start
    #[serde(rename = "countdown")]
    Countdown {
        /// Milliseconds remaining
        remaining_ms: u64,
    },

    /// Engine is listening; capture may begin
    #[serde(rename = "conversation_started")]
    ConversationStarted {
        /// Confirmation for display
        message: String,
    },

    /// Agent speech transcript
    #[serde(rename = "agent_response")]
    AgentResponse {
        /// Transcript text
        transcript: String,
    },

    /// User speech transcript
    #[serde(rename = "user_transcript")]
    UserTranscript {
        /// Transcript text
        transcript: String,
    },

    /// One playable audio frame
    #[serde(rename = "audio")]
    Audio {
        /// Base64-encoded PCM16 mono
        audio_data: String,
        /// Sample rate of the payload
        sample_rate_hz: u32,
        /// Payload encoding, always "pcm16"
        encoding: &'static str,
    },

    /// Conversation is over
    #[serde(rename = "conversation_ended")]
    ConversationEnded {
        /// Reason for display
        message: String,
    },

    /// Error message
    #[serde(rename = "error")]
    Error {
        /// Error message
        message: String,
    },
}

impl ClientBound {
    pub fn error(message: impl Into<String>) -> Self {
        ClientBound::Error {
            message: message.into(),
        }
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Routing units for the sender task
pub enum ConversationRoute {
    /// JSON text message
    Outgoing(ClientBound),
    /// Close the client connection
    Close,
}

// =============================================================================
// Validation
// =============================================================================

/// Error type for message validation failures
#[derive(Debug, Clone)]
pub enum ConversationValidationError {
    /// Text content exceeds maximum allowed size
    TextTooLarge { size: usize, max: usize },
    /// Capture frame exceeds maximum allowed size
    FrameTooLarge { size: usize, max: usize },
}

impl std::fmt::Display for ConversationValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextTooLarge { size, max } => {
                write!(f, "Text too large: {} bytes (max: {} bytes)", size, max)
            }
            Self::FrameTooLarge { size, max } => {
                write!(
                    f,
                    "Audio frame too large: {} bytes (max: {} bytes)",
                    size, max
                )
            }
        }
    }
}

impl std::error::Error for ConversationValidationError {}

// =============================================================================
// Tests
// =============================================================================
