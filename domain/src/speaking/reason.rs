//! Speak reasons

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why an agent asks for the floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakReasonKind {
    /// Explicitly `@`-mentioned
    Mentioned,
    FollowUp,
    AutoReply,
    Other,
}

impl SpeakReasonKind {
    pub fn as_str(&self) -> &str {
        match self {
            SpeakReasonKind::Mentioned => "mentioned",
            SpeakReasonKind::FollowUp => "follow_up",
            SpeakReasonKind::AutoReply => "auto_reply",
            SpeakReasonKind::Other => "other",
        }
    }
}

impl std::fmt::Display for SpeakReasonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Optional scoring inputs
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReasonFactors {
    pub is_moderator: bool,
    /// Context relevance in `[0, 1]`
    pub context_relevance: Option<f64>,
    /// `Duration::MAX` for an agent that never spoke
    pub time_since_last_spoke: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeakReason {
    pub kind: SpeakReasonKind,
    pub description: String,
    pub factors: ReasonFactors,
}

impl SpeakReason {
    pub fn new(kind: SpeakReasonKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            factors: ReasonFactors::default(),
        }
    }

    pub fn mentioned() -> Self {
        Self::new(SpeakReasonKind::Mentioned, "Agent was mentioned in the message")
    }

    pub fn follow_up() -> Self {
        Self::new(SpeakReasonKind::FollowUp, "Follow-up to a reply to the agent")
    }

    pub fn auto_reply() -> Self {
        Self::new(SpeakReasonKind::AutoReply, "Auto reply based on context")
    }

    pub fn with_factors(mut self, factors: ReasonFactors) -> Self {
        self.factors = factors;
        self
    }
}
