//! Telephony escalation trigger.
//!
//! Escalation itself (dialing, TwiML, retries) lives behind an external
//! webhook; this client makes exactly one POST and reports the outcome.
//! Keyword detection is the engine's job; the relay only forwards
//! transcripts and never decides to escalate on its own. The sole caller
//! here is the explicit test endpoint.

use chrono::Utc;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors from triggering the escalation webhook.
#[derive(Debug, Error)]
pub enum EscalationError {
    /// No webhook URL configured
    #[error("No escalation webhook configured")]
    NotConfigured,

    /// The request could not be delivered
    #[error("Escalation webhook request failed: {0}")]
    Request(String),

    /// The webhook answered with a non-success status
    #[error("Escalation webhook returned status {0}")]
    Status(u16),
}

/// Client for the configured escalation webhook.
#[derive(Clone)]
pub struct EscalationClient {
    http: reqwest::Client,
    webhook_url: Option<String>,
    auth_token: Option<String>,
}

impl EscalationClient {
    pub fn new(
        http: reqwest::Client,
        webhook_url: Option<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            http,
            webhook_url,
            auth_token,
        }
    }

    /// Whether a webhook URL is configured.
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Fire the webhook once. No retries: the caller decides what a failed
    /// escalation means.
    ///
    /// `contact` is whatever emergency-contact snapshot the profile holds;
    /// it is forwarded verbatim.
    pub async fn trigger(&self, contact: Value, reason: &str) -> Result<u16, EscalationError> {
        let url = self
            .webhook_url
            .as_ref()
            .ok_or(EscalationError::NotConfigured)?;

        let body = json!({
            "reason": reason,
            "emergency_contact": contact,
            "triggered_at": Utc::now().to_rfc3339(),
        });

        let mut request = self.http.post(url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EscalationError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(status = status.as_u16(), "Escalation webhook triggered");
            Ok(status.as_u16())
        } else {
            Err(EscalationError::Status(status.as_u16()))
        }
    }
}
