//! Core of the conversation relay: audio framing, the engine wire protocol,
//! the delayed-start scheduler and the session state machine.

pub mod audio;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod session;

// Re-export commonly used types for convenience
pub use audio::{
    DEFAULT_SAMPLE_RATE_HZ, decode_pcm, decode_to_samples, pcm_to_samples, pcm_to_wav,
    wrap_as_container,
};
pub use error::{SessionError, SessionResult};
pub use protocol::{EngineCommand, EngineEvent};
pub use scheduler::{DEFAULT_GRACE_MS, SchedulerSignal, StartScheduler};
pub use session::{
    ConversationSession, DEFAULT_USER_ID, EngineAudio, SessionConfig, SessionEvent, SessionState,
};
