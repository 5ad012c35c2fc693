pub mod config;
pub mod core;
pub mod escalation;
pub mod handlers;
pub mod profile;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use config::ServerConfig;
pub use core::*;
pub use escalation::{EscalationClient, EscalationError};
pub use profile::ProfileStore;
pub use state::AppState;
