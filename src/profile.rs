//! Persisted user profile document and scheduled-task lookup.
//!
//! The profile is an opaque JSON document: the relay stores and returns it
//! without enforcing any schema. The scheduled-task computation reads the
//! fields it understands defensively and yields nothing when they are
//! absent or malformed, so arbitrary documents are always safe to save.

use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveTime, Timelike};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

/// One task due now, derived from the profile document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduledTask {
    /// "reminder" or "check_in"
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable text for the client to speak or display
    pub message: String,
}

/// Disk-backed profile document plus check-in cadence state.
pub struct ProfileStore {
    path: PathBuf,
    last_check_in: Mutex<DateTime<Local>>,
}

impl ProfileStore {
    /// Open a store at `path`. The file need not exist yet; the first
    /// check-in becomes due one full cadence after startup.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_check_in: Mutex::new(Local::now()),
        }
    }

    /// Load the profile document.
    ///
    /// Missing or unreadable files yield an empty object rather than an
    /// error; the document has no required shape.
    pub fn load(&self) -> Value {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), "Profile document is not valid JSON: {}", e);
                    Value::Object(Default::default())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read profile document: {}", e);
                Value::Object(Default::default())
            }
        }
    }

    /// Persist the profile document atomically (write to a temp file in the
    /// same directory, then rename over the target).
    pub fn save(&self, document: &Value) -> std::io::Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::info!(path = %self.path.display(), "Profile document saved");
        Ok(())
    }

    /// Tasks due right now.
    pub fn scheduled_tasks(&self) -> Vec<ScheduledTask> {
        self.scheduled_tasks_at(Local::now())
    }

    /// Tasks due at `now`: reminders whose `HH:MM` falls in the current
    /// minute, plus a check-in when the configured cadence has elapsed.
    pub fn scheduled_tasks_at(&self, now: DateTime<Local>) -> Vec<ScheduledTask> {
        let document = self.load();
        let mut tasks = Vec::new();

        if let Some(reminders) = document.get("reminders").and_then(Value::as_array) {
            for reminder in reminders {
                let Some(time) = reminder.get("time").and_then(Value::as_str) else {
                    continue;
                };
                let Ok(at) = NaiveTime::parse_from_str(time, "%H:%M") else {
                    continue;
                };
                if at.hour() == now.hour() && at.minute() == now.minute() {
                    let message = reminder
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or("You have a reminder")
                        .to_string();
                    tasks.push(ScheduledTask {
                        kind: "reminder".to_string(),
                        message,
                    });
                }
            }
        }

        let cadence_minutes = document
            .get("checkInFrequency")
            .or_else(|| document.get("check_in_frequency_minutes"))
            .and_then(Value::as_u64);
        if let Some(cadence) = cadence_minutes {
            if cadence > 0 {
                let mut last = self.last_check_in.lock();
                let elapsed = now.signed_duration_since(*last);
                if elapsed.num_minutes() >= cadence as i64 {
                    *last = now;
                    tasks.push(ScheduledTask {
                        kind: "check_in".to_string(),
                        message: "Time for a check-in".to_string(),
                    });
                }
            }
        }

        tasks
    }
}
