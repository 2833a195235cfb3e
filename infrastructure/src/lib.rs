//! Infrastructure layer for roundtable
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod generation;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileAgentsConfig, FileConfig, FileDiscussionConfig,
    FileOutputConfig, FilePersona, FileSchedulerConfig,
};
pub use generation::ScriptedBackend;
pub use logging::JsonlTranscriptLogger;
pub use storage::InMemoryDiscussionRepository;
