//! Session driver: the single owner of session state.
//!
//! Every mutation, including the scheduler fire, passes through the
//! `select!` loop in [`SessionDriver::run`], so no two transitions can ever
//! be applied concurrently. Outbound frames are enqueued to the writer task
//! without awaiting, which keeps a backed-up socket from delaying inbound
//! processing or `stop()`.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::core::audio::framer;
use crate::core::error::SessionError;
use crate::core::protocol::{EngineCommand, EngineEvent};
use crate::core::scheduler::{SchedulerSignal, StartScheduler};

use super::engine::{EngineConnection, EngineReadHalf};
use super::{EngineAudio, SessionConfig, SessionEvent, SessionState};

/// Commands accepted by the driver from the session handle.
#[derive(Debug)]
pub(crate) enum Command {
    RequestStart { user_id: String },
    SubmitAudio(Bytes),
    SubmitText(String),
    Stop,
}

pub(crate) struct SessionDriver {
    id: String,
    config: SessionConfig,
    state: SessionState,
    connection: EngineConnection,
    read: EngineReadHalf,
    cmd_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::Sender<SessionEvent>,
    state_tx: watch::Sender<SessionState>,
    scheduler: Option<StartScheduler>,
    start_sent: bool,
    frames_accepted: u64,
    frames_dropped: u64,
}

impl SessionDriver {
    pub(crate) fn new(
        id: String,
        config: SessionConfig,
        connection: EngineConnection,
        read: EngineReadHalf,
        cmd_rx: mpsc::Receiver<Command>,
        event_tx: mpsc::Sender<SessionEvent>,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        Self {
            id,
            config,
            state: SessionState::Created,
            connection,
            read,
            cmd_rx,
            event_tx,
            state_tx,
            scheduler: None,
            start_sent: false,
            frames_accepted: 0,
            frames_dropped: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        // The transport was established before the driver was spawned.
        self.transition(SessionState::Connecting);

        while !self.state.is_terminal() {
            tokio::select! {
                maybe_cmd = self.cmd_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // All handles dropped: nothing can drive the session
                    // further, treat it as a stop.
                    None => self.end_locally("Session handle dropped"),
                },
                maybe_msg = self.read.next() => match maybe_msg {
                    Some(Ok(msg)) => self.handle_transport_message(msg),
                    Some(Err(e)) => self.fail(&format!("transport error: {e}")),
                    None => self.fail("connection lost"),
                },
                signal = next_scheduler_signal(&mut self.scheduler), if self.scheduler.is_some() => {
                    self.handle_scheduler_signal(signal);
                }
            }
        }

        tracing::info!(
            session_id = %self.id,
            state = %self.state,
            frames_accepted = self.frames_accepted,
            frames_dropped = self.frames_dropped,
            "Session closed"
        );
    }

    // -------------------------------------------------------------------------
    // Command handling
    // -------------------------------------------------------------------------

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::RequestStart { user_id } => {
                if self.state == SessionState::AwaitingStart {
                    self.activate(user_id, "Conversation started".to_string());
                } else {
                    tracing::debug!(
                        session_id = %self.id,
                        state = %self.state,
                        "Ignoring start request outside AWAITING_START"
                    );
                }
            }
            Command::SubmitAudio(frame) => {
                if self.state == SessionState::Active {
                    if self.connection.send_audio(frame) {
                        self.frames_accepted += 1;
                    } else {
                        self.frames_dropped += 1;
                    }
                } else {
                    // Never buffered: audio must not reach the engine before
                    // it is listening.
                    self.frames_dropped += 1;
                    tracing::debug!(
                        session_id = %self.id,
                        state = %self.state,
                        "Dropping capture frame before ACTIVE"
                    );
                }
            }
            Command::SubmitText(text) => {
                if self.state == SessionState::Active {
                    self.connection.send_control(EngineCommand::Text { text });
                } else {
                    tracing::debug!(
                        session_id = %self.id,
                        state = %self.state,
                        "Dropping text input before ACTIVE"
                    );
                }
            }
            Command::Stop => self.end_locally("Conversation stopped"),
        }
    }

    // -------------------------------------------------------------------------
    // Engine message handling
    // -------------------------------------------------------------------------

    fn handle_transport_message(&mut self, msg: Message) {
        match msg {
            Message::Text(text) => match serde_json::from_str::<EngineEvent>(&text) {
                Ok(EngineEvent::Unknown) => {
                    // Forward-compatibility: unknown types are discarded,
                    // never fatal.
                    tracing::debug!(
                        session_id = %self.id,
                        raw = %text,
                        "Discarding control message of unknown type"
                    );
                }
                Ok(event) => self.handle_engine_event(event),
                Err(e) => {
                    let err = SessionError::Protocol(format!("bad control message: {e}"));
                    tracing::warn!(session_id = %self.id, "{err}");
                    self.emit(SessionEvent::Error {
                        message: err.to_string(),
                        fatal: false,
                    });
                }
            },
            Message::Binary(_) => {
                tracing::debug!(session_id = %self.id, "Ignoring binary frame from engine");
            }
            Message::Ping(payload) => self.connection.send_pong(payload),
            Message::Close(_) => self.fail("connection closed by engine"),
            _ => {}
        }
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SessionCreated {
                session_id,
                message,
            } => {
                if self.state == SessionState::Connecting {
                    self.transition(SessionState::AwaitingStart);
                    self.scheduler = Some(StartScheduler::arm(self.config.grace));
                    tracing::info!(
                        session_id = %self.id,
                        engine_session_id = %session_id,
                        grace_ms = self.config.grace.as_millis() as u64,
                        "Engine session established; start countdown armed"
                    );
                    self.emit(SessionEvent::Created {
                        engine_session_id: session_id,
                        message,
                    });
                    self.emit(SessionEvent::Countdown {
                        remaining_ms: self.config.grace.as_millis() as u64,
                    });
                } else {
                    tracing::debug!(session_id = %self.id, "Duplicate session_created ignored");
                }
            }
            EngineEvent::ConversationStarted { message } => match self.state {
                // Engine-driven start: it is already listening, so send no
                // start of our own.
                SessionState::AwaitingStart => {
                    self.disarm_scheduler();
                    self.start_sent = true;
                    self.transition(SessionState::Active);
                    self.emit(SessionEvent::Started { message });
                }
                SessionState::Active => {
                    tracing::debug!(session_id = %self.id, "Engine confirmed active conversation");
                }
                _ => {
                    tracing::debug!(
                        session_id = %self.id,
                        state = %self.state,
                        "conversation_started ignored"
                    );
                }
            },
            EngineEvent::ConversationEnded { message } => self.end_remotely(message),
            EngineEvent::AgentResponse { transcript } => {
                self.emit(SessionEvent::AgentTranscript { text: transcript });
            }
            EngineEvent::UserTranscript { transcript } => {
                self.emit(SessionEvent::UserTranscript { text: transcript });
            }
            EngineEvent::Audio {
                audio_data,
                sample_rate_hz,
            } => match framer::decode_pcm(&audio_data) {
                Ok(pcm) => self.emit(SessionEvent::Audio(EngineAudio {
                    pcm: Bytes::from(pcm),
                    sample_rate_hz: sample_rate_hz.unwrap_or(framer::DEFAULT_SAMPLE_RATE_HZ),
                })),
                Err(err) => {
                    // One bad frame never aborts the session.
                    tracing::warn!(session_id = %self.id, "{err}");
                    self.emit(SessionEvent::Error {
                        message: err.to_string(),
                        fatal: false,
                    });
                }
            },
            EngineEvent::Error { message } => {
                tracing::warn!(session_id = %self.id, engine_error = %message, "Engine reported an error");
                self.emit(SessionEvent::Error {
                    message,
                    fatal: false,
                });
            }
            // Filtered at the dispatch site; nothing to do here.
            EngineEvent::Unknown => {}
        }
    }

    // -------------------------------------------------------------------------
    // Scheduler handling
    // -------------------------------------------------------------------------

    fn handle_scheduler_signal(&mut self, signal: SchedulerSignal) {
        match signal {
            SchedulerSignal::Tick(remaining) => {
                self.emit(SessionEvent::Countdown {
                    remaining_ms: remaining.as_millis() as u64,
                });
            }
            SchedulerSignal::Fired => {
                self.scheduler = None;
                if self.state == SessionState::AwaitingStart {
                    let user_id = self.config.user_id.clone();
                    self.activate(user_id, "Conversation started".to_string());
                } else {
                    // Single-shot contract makes this unreachable; if it ever
                    // trips it is a defect, not a user-visible condition.
                    let err = SessionError::SchedulerMisuse(format!(
                        "start timer fired in state {}",
                        self.state
                    ));
                    tracing::error!(session_id = %self.id, "{err}");
                }
            }
            SchedulerSignal::Canceled => {
                self.scheduler = None;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// AWAITING_START -> ACTIVE: the one place the `start` message is sent.
    fn activate(&mut self, user_id: String, message: String) {
        if self.start_sent {
            let err = SessionError::SchedulerMisuse("start already sent".to_string());
            tracing::error!(session_id = %self.id, "{err}");
            return;
        }
        self.disarm_scheduler();
        self.start_sent = true;
        self.connection.send_control(EngineCommand::Start { user_id });
        self.transition(SessionState::Active);
        self.emit(SessionEvent::Started { message });
    }

    /// Local stop: notify the engine best-effort, then close.
    fn end_locally(&mut self, message: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.disarm_scheduler();
        self.connection.send_control(EngineCommand::Stop);
        self.connection.close();
        self.transition(SessionState::Ended);
        self.emit(SessionEvent::Ended {
            message: message.to_string(),
        });
    }

    /// Engine closed the logical conversation.
    fn end_remotely(&mut self, message: String) {
        if self.state.is_terminal() {
            return;
        }
        self.disarm_scheduler();
        self.connection.close();
        self.transition(SessionState::Ended);
        self.emit(SessionEvent::Ended { message });
    }

    fn fail(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.disarm_scheduler();
        self.connection.close();
        self.transition(SessionState::Failed);
        let err = SessionError::ConnectionFailed(reason.to_string());
        tracing::warn!(session_id = %self.id, "{err}");
        self.emit(SessionEvent::Error {
            message: err.to_string(),
            fatal: true,
        });
    }

    fn disarm_scheduler(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.cancel();
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state == next {
            return;
        }
        tracing::info!(session_id = %self.id, from = %self.state, to = %next, "Session state change");
        self.state = next;
        let _ = self.state_tx.send(next);
    }

    /// Events are advisory: a full or closed receiver loses the event
    /// instead of stalling the state machine.
    fn emit(&mut self, event: SessionEvent) {
        if self.event_tx.try_send(event).is_err() {
            tracing::debug!(session_id = %self.id, "Lifecycle event dropped (receiver busy or gone)");
        }
    }
}

async fn next_scheduler_signal(scheduler: &mut Option<StartScheduler>) -> SchedulerSignal {
    match scheduler {
        Some(s) => s.next_signal().await,
        None => std::future::pending().await,
    }
}
