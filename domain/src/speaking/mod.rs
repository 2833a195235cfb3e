//! Speak arbitration domain module
//!
//! Why an agent wants the floor ([`SpeakReason`]), how competing requests are
//! ranked ([`ScoringWeights`]), and what the scheduler reports
//! ([`SchedulerEvent`]).

pub mod notice;
pub mod reason;
pub mod scoring;

pub use notice::{SchedulerEvent, TurnId};
pub use reason::{ReasonFactors, SpeakReason, SpeakReasonKind};
pub use scoring::ScoringWeights;
