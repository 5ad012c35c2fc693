//! HTTP and WebSocket request handlers
//!
//! This module organizes all API handlers into logical groups:
//! - `api` - Service info, health, session listing, profile and escalation endpoints
//! - `conversation` - Conversation WebSocket bridging browsers to the engine

pub mod api;
pub mod conversation;

// Re-export commonly used handlers for convenient access
pub use conversation::conversation_handler;
