//! Shared application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::config::ServerConfig;
use crate::core::session::SessionState;
use crate::escalation::EscalationClient;
use crate::profile::ProfileStore;

/// Registry entry for a live session.
///
/// Holds a state subscription rather than the session handle itself; the
/// handle stays exclusively owned by the connection that created it.
pub struct SessionEntry {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub state_rx: watch::Receiver<SessionState>,
}

/// Point-in-time view of a session for the listing endpoint.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub user_id: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

/// Application state shared by all handlers.
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: DashMap<String, SessionEntry>,
    pub profiles: ProfileStore,
    pub escalation: EscalationClient,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let http = reqwest::Client::new();
        let profiles = ProfileStore::new(config.profile_path.clone());
        let escalation = EscalationClient::new(
            http,
            config.escalation_webhook_url.clone(),
            config.escalation_auth_token.clone(),
        );
        Arc::new(Self {
            config,
            sessions: DashMap::new(),
            profiles,
            escalation,
        })
    }

    /// Track a session for the listing and health endpoints.
    pub fn register_session(
        &self,
        id: &str,
        user_id: &str,
        state_rx: watch::Receiver<SessionState>,
    ) {
        self.sessions.insert(
            id.to_string(),
            SessionEntry {
                user_id: user_id.to_string(),
                created_at: Utc::now(),
                state_rx,
            },
        );
    }

    pub fn unregister_session(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Sessions that have not reached a terminal state.
    pub fn active_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| !entry.state_rx.borrow().is_terminal())
            .count()
    }

    pub fn session_snapshots(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|entry| SessionSnapshot {
                id: entry.key().clone(),
                user_id: entry.user_id.clone(),
                state: entry.state_rx.borrow().to_string(),
                created_at: entry.created_at,
            })
            .collect()
    }
}
