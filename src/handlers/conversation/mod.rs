//! Conversation WebSocket handlers
//!
//! This module bridges browser clients to the conversational engine. Each
//! WebSocket connection owns one engine session for its entire lifetime.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **start**: Begin the conversation now instead of waiting out the grace period
//! - **text**: Send a text message into the conversation
//! - **stop**: End the conversation
//! - **Binary frames**: Capture audio (PCM 16-bit, mono), forwarded as-is
//!
//! ## Server → Client
//!
//! - **session_created**: Engine session established, grace countdown running
//! - **countdown**: Milliseconds remaining until the conversation auto-starts
//! - **conversation_started**: Conversation is live, audio is accepted
//! - **agent_response**: Agent transcript
//! - **user_transcript**: Recognized user speech
//! - **audio**: Agent audio (base64 PCM 16-bit)
//! - **conversation_ended**: Conversation finished
//! - **error**: Error message

mod handler;
pub mod messages;

pub use handler::conversation_handler;
