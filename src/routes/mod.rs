//! Route configuration
//!
//! Routers are assembled here and merged in `main.rs`:
//! - `api` - REST endpoints (health, conversations, profile, escalation)
//! - `conversation` - Conversation WebSocket endpoint

pub mod api;
pub mod conversation;

pub use api::create_api_router;
pub use conversation::create_conversation_router;
