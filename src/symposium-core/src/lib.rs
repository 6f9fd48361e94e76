//! Symposium Core Library
//!
//! Runs moderated debates between language-model speakers: turn selection,
//! per-turn context, round limits and graceful degradation when the model
//! misbehaves.

pub mod config;
pub mod error;
pub mod inference;
pub mod moderator;
pub mod phase;
pub mod retry;
pub mod session;
pub mod speaker;
pub mod structured;
pub mod text;
pub mod transcript;

pub use config::{Config, default_config};
pub use error::{DebateError, InferenceError};
pub use inference::{Inference, InferenceRequest, OpenAiInference, OutputSchema};
pub use moderator::{Analysis, Moderator, ModeratorAction};
pub use phase::Phase;
pub use retry::RetryPolicy;
pub use session::{DebateCallback, DebateEvent, DebateSession, SessionConfig, SessionState, Stage};
pub use speaker::{Roster, Speaker, SpeakerId, SpeakerSpec, Turn};
pub use transcript::{ModeratorNote, NoteKind, Transcript, TranscriptEntry, Utterance};
