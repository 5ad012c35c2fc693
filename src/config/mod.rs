//! Configuration for the voicebridge server
//!
//! Configuration comes from environment variables (a `.env` file is loaded
//! at startup) with CLI flags overriding individual values. Secrets are
//! zeroized when the configuration is dropped.
//!
//! # Example
//! ```rust,no_run
//! use voicebridge::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroize;

use crate::core::scheduler::DEFAULT_GRACE_MS;
use crate::core::session::DEFAULT_USER_ID;

/// Server configuration
///
/// Contains everything needed to run the voicebridge server:
/// - Listen address
/// - Engine connection settings (address, optional API key, start grace)
/// - CORS policy
/// - Profile document location
/// - Escalation webhook settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// WebSocket address of the conversational-AI engine (ws:// or wss://)
    pub engine_ws_url: String,
    /// Bearer token for the engine handshake, if the engine requires one
    pub engine_api_key: Option<String>,
    /// User id reported to the engine when the client does not supply one
    pub default_user_id: String,
    /// Grace period in milliseconds between engine acknowledgment and start
    pub start_grace_ms: u64,
    /// Comma-separated allowed CORS origins, or "*" for any
    pub cors_allowed_origins: Option<String>,
    /// Location of the persisted profile document
    pub profile_path: PathBuf,
    /// Webhook invoked by the escalation test endpoint
    pub escalation_webhook_url: Option<String>,
    /// Bearer token for the escalation webhook
    pub escalation_auth_token: Option<String>,
}

impl Drop for ServerConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.engine_api_key {
            key.zeroize();
        }
        if let Some(ref mut token) = self.escalation_auth_token {
            token.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// A `.env` file, if present, is loaded in `main` before this runs, so
    /// actual environment variables override `.env` values. Validates the
    /// result before returning it.
    ///
    /// # Errors
    /// Returns an error when `ENGINE_WS_URL` is missing or malformed, or
    /// when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let port = env_or("PORT", "8001")
            .parse::<u16>()
            .map_err(|e| format!("PORT is not a valid port number: {e}"))?;
        let start_grace_ms = env_or("START_GRACE_MS", &DEFAULT_GRACE_MS.to_string())
            .parse::<u64>()
            .map_err(|e| format!("START_GRACE_MS is not a valid duration: {e}"))?;

        let config = Self {
            host: env_or("HOST", "0.0.0.0"),
            port,
            engine_ws_url: env_opt("ENGINE_WS_URL")
                .ok_or("ENGINE_WS_URL is required (ws:// or wss:// address of the engine)")?,
            engine_api_key: env_opt("ENGINE_API_KEY"),
            default_user_id: env_or("DEFAULT_USER_ID", DEFAULT_USER_ID),
            start_grace_ms,
            cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS"),
            profile_path: PathBuf::from(env_or("PROFILE_PATH", "profile.json")),
            escalation_webhook_url: env_opt("ESCALATION_WEBHOOK_URL"),
            escalation_auth_token: env_opt("ESCALATION_AUTH_TOKEN"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        let url = url::Url::parse(&self.engine_ws_url)
            .map_err(|e| format!("ENGINE_WS_URL is not a valid URL: {e}"))?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(format!(
                "ENGINE_WS_URL must use the ws:// or wss:// scheme, got {}://",
                url.scheme()
            )
            .into());
        }
        if let Some(ref webhook) = self.escalation_webhook_url {
            let url = url::Url::parse(webhook)
                .map_err(|e| format!("ESCALATION_WEBHOOK_URL is not a valid URL: {e}"))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err("ESCALATION_WEBHOOK_URL must be an http(s) URL".into());
            }
        }
        Ok(())
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Start grace as a [`Duration`].
    pub fn start_grace(&self) -> Duration {
        Duration::from_millis(self.start_grace_ms)
    }

    /// Whether the escalation webhook is configured.
    pub fn has_escalation_webhook(&self) -> bool {
        self.escalation_webhook_url.is_some()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
