//! Application layer for roundtable
//!
//! Speak arbitration, the agent turn protocol and the discussion lifecycle,
//! plus the ports the infrastructure layer implements. Depends only on the
//! domain layer.

pub mod agent;
pub mod bus;
pub mod clock;
pub mod config;
pub mod discussion;
pub mod ports;
pub mod scheduler;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use agent::{AgentEnvironment, AgentRegistry, AgentRuntime, SyncReport};
pub use bus::{StateStore, Topic};
pub use config::{AgentBehavior, LifecycleConfig, RoundtableConfig, SchedulerConfig};
pub use discussion::{
    DiscussionError, DiscussionErrorKind, DiscussionManager, DiscussionManagerBuilder,
    ErrorContext,
};
pub use ports::{
    generation::{GenerationBackend, GenerationError, StreamHandle},
    storage::{DiscussionRepository, StorageError},
    transcript::{NoTranscript, TranscriptEvent, TranscriptLogger},
};
pub use scheduler::{SpeakRequest, SpeakScheduler, Turn, TurnError};
