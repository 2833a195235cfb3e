//! Domain layer for roundtable
//!
//! Pure types for a turn-taking discussion between autonomous agents and a
//! human user. No async runtime and no I/O live here.
//!
//! # Core Concepts
//!
//! - **Discussion**: an ordered message log, a member list and settings,
//!   held in a [`DiscussionState`] that only changes through validated
//!   transitions.
//! - **Speak request**: an agent's bid for the floor, ranked by
//!   [`ScoringWeights`] from a [`SpeakReason`].
//! - **Turn**: the window in which exactly one agent holds the floor and
//!   generates a reply, identified by a [`TurnId`].

pub mod agent;
pub mod core;
pub mod discussion;
pub mod generation;
pub mod speaking;

pub use agent::{
    AgentProfile, AgentRole, AgentRuntimeState, Eligibility, MentionMatcher, TurnPhase,
    runtime_state::IneligibleReason,
};
pub use core::{
    error::DomainError,
    ids::{AgentId, DiscussionId, MessageId},
    string::truncate,
};
pub use discussion::{
    Author, Discussion, DiscussionEvent, DiscussionSettings, DiscussionState, Member, Message,
    MessageStatus, ModerationStyle, NewMessage, message::INTERRUPTED_MARKER,
};
pub use generation::{GenerationContext, StreamEvent};
pub use speaking::{
    ReasonFactors, SchedulerEvent, ScoringWeights, SpeakReason, SpeakReasonKind, TurnId,
};
