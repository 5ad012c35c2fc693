//! Engine wire protocol for the conversation relay.
//!
//! Control messages are JSON text frames over the duplex connection; locally
//! captured audio travels as raw binary frames with no JSON envelope.
//!
//! Commands (sent to the engine):
//! - start - begin the conversation, arm engine listening
//! - stop - end the conversation, release engine-side resources
//! - text - substitute textual input for audio
//!
//! Events (received from the engine):
//! - session_created - acknowledges session establishment
//! - conversation_started - engine is now actively listening
//! - conversation_ended - engine closed the logical conversation
//! - agent_response / user_transcript - textual transcript events
//! - audio - one base64 PCM16 mono frame
//! - error - non-fatal-by-default error description
//!
//! Parsing is deliberately forward-compatible: an event whose `type` is not
//! in the known set deserializes into [`EngineEvent::Unknown`] and is logged
//! and discarded by the session, never treated as fatal. A known `type`
//! missing a required field fails deserialization and is reported as a
//! protocol error without changing session state.

use serde::{Deserialize, Serialize};

// =============================================================================
// Commands (local -> engine)
// =============================================================================

/// Control messages sent to the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EngineCommand {
    /// Begin the conversation for the given user
    #[serde(rename = "start")]
    Start {
        /// Identifier the engine attributes the conversation to
        user_id: String,
    },

    /// End the conversation
    #[serde(rename = "stop")]
    Stop,

    /// Textual input in place of audio
    #[serde(rename = "text")]
    Text {
        /// Text content
        text: String,
    },
}

// =============================================================================
// Events (engine -> local)
// =============================================================================

/// Control messages received from the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Session establishment acknowledged
    #[serde(rename = "session_created")]
    SessionCreated {
        /// Engine-assigned session identifier
        session_id: String,
        /// Human-readable greeting
        message: String,
    },

    /// Engine is now actively listening
    #[serde(rename = "conversation_started")]
    ConversationStarted {
        /// Human-readable confirmation
        message: String,
    },

    /// Engine closed the logical conversation
    #[serde(rename = "conversation_ended")]
    ConversationEnded {
        /// Human-readable reason
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

    /// One PCM16 mono audio frame
    #[serde(rename = "audio")]
    Audio {
        /// Base64-encoded little-endian 16-bit PCM
        audio_data: String,
        /// Declared sample rate; 24000 when absent
        #[serde(default)]
        sample_rate_hz: Option<u32>,
    },

    /// Engine-reported error, non-fatal by default
    #[serde(rename = "error")]
    Error {
        /// Error description
        message: String,
    },

    /// Any `type` outside the known set; logged and discarded
    #[serde(other)]
    Unknown,
}

impl EngineCommand {
    /// Serialize the command for the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Tests
// =============================================================================
