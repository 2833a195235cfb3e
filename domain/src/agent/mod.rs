//! Agent domain module
//!
//! Persona configuration, per-agent runtime state (the turn state machine
//! and response eligibility rules) and `@name` mention matching.

pub mod mention;
pub mod profile;
pub mod runtime_state;

pub use mention::MentionMatcher;
pub use profile::{AgentProfile, AgentRole};
pub use runtime_state::{AgentRuntimeState, Eligibility, TurnPhase};
