//! Per-agent runtime state and the turn state machine.
//!
//! ```text
//! Idle ──▶ Evaluating ──▶ Requesting ──▶ Speaking ──▶ Idle
//!  ▲  │         │              │
//!  │  └──────▶ Paused ◀────────┴── (any phase can pause)
//!  └────────────┘
//! ```
//!
//! Time is passed in explicitly (`now`) so callers can drive the state with
//! whatever clock they own.

use crate::core::error::DomainError;
use crate::core::ids::MessageId;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Phase of an agent's turn-taking cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    /// Deciding whether to answer an incoming message
    Evaluating,
    /// A speak request is pending in the scheduler
    Requesting,
    /// The agent holds the floor
    Speaking,
    Paused,
}

impl TurnPhase {
    pub fn as_str(&self) -> &str {
        match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Evaluating => "evaluating",
            TurnPhase::Requesting => "requesting",
            TurnPhase::Speaking => "speaking",
            TurnPhase::Paused => "paused",
        }
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        match (self, next) {
            (_, Paused) => true,
            (Paused, Idle) => true,
            (Paused, _) => false,
            (Idle, Evaluating) => true,
            (Evaluating, Requesting | Idle) => true,
            // a newer message re-opens evaluation while a request is pending
            (Requesting, Evaluating | Speaking | Idle) => true,
            (Speaking, Idle) => true,
            (a, b) => *a == b,
        }
    }
}

impl std::fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The message mentions the agent: answer regardless of auto-reply
    Mentioned,
    /// The message answers the agent's last reply
    FollowUp,
    /// Auto-reply applies
    AutoReply,
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Eligibility::Ineligible(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IneligibleReason {
    Paused,
    AlreadySpeaking,
    AutoReplyDisabled,
    Thinking,
    OwnMessage,
    TooSoon,
}

/// Mutable runtime state of one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRuntimeState {
    pub auto_reply: bool,
    /// Answer the agent's own messages (only matters for auto-reply)
    pub respond_to_self: bool,
    pub is_thinking: bool,
    pub last_spoke_at: Option<Instant>,
    /// Id of the last message this agent posted
    pub last_reply: Option<MessageId>,
    phase: TurnPhase,
}

impl Default for AgentRuntimeState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AgentRuntimeState {
    pub fn new(auto_reply: bool) -> Self {
        Self {
            auto_reply,
            respond_to_self: false,
            is_thinking: false,
            last_spoke_at: None,
            last_reply: None,
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.phase == TurnPhase::Paused
    }

    /// Ready means: not paused and not generating
    pub fn is_ready(&self) -> bool {
        !self.is_paused() && !self.is_thinking
    }

    /// Move the turn state machine, rejecting illegal transitions.
    pub fn transition(&mut self, next: TurnPhase) -> Result<(), DomainError> {
        if !self.phase.can_transition_to(next) {
            return Err(DomainError::InvalidTurnTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    pub fn pause(&mut self) {
        self.phase = TurnPhase::Paused;
        self.is_thinking = false;
    }

    pub fn resume(&mut self) {
        if self.phase == TurnPhase::Paused {
            self.phase = TurnPhase::Idle;
        }
        self.is_thinking = false;
    }

    /// Time since the agent last spoke, `None` if it never did
    pub fn silence(&self, now: Instant) -> Option<Duration> {
        self.last_spoke_at
            .map(|at| now.saturating_duration_since(at))
    }

    /// Whether a message with this origin answers the agent's last reply
    pub fn answers_last_reply(&self, origin: Option<&MessageId>) -> bool {
        origin.is_some() && origin == self.last_reply.as_ref()
    }

    /// Eligibility for a follow-up turn.
    ///
    /// Like a mention it ignores auto-reply, thinking and the delay, but a
    /// paused or speaking agent still stays silent.
    pub fn evaluate_follow_up(&self) -> Eligibility {
        match self.phase {
            TurnPhase::Paused => Eligibility::Ineligible(IneligibleReason::Paused),
            TurnPhase::Speaking => Eligibility::Ineligible(IneligibleReason::AlreadySpeaking),
            _ => Eligibility::FollowUp,
        }
    }

    /// Decide whether an incoming message warrants a speak request.
    ///
    /// Paused and speaking agents never answer. A mention forces an answer;
    /// otherwise auto-reply must be on, the agent must not be thinking, the
    /// message must not be its own (unless `respond_to_self`), and at least
    /// `min_delay` must have passed since the agent last spoke.
    pub fn evaluate(
        &self,
        mentioned: bool,
        own_message: bool,
        now: Instant,
        min_delay: Duration,
    ) -> Eligibility {
        match self.phase {
            TurnPhase::Paused => return Eligibility::Ineligible(IneligibleReason::Paused),
            TurnPhase::Speaking => {
                return Eligibility::Ineligible(IneligibleReason::AlreadySpeaking);
            }
            _ => {}
        }

        if mentioned {
            return Eligibility::Mentioned;
        }
        if !self.auto_reply {
            return Eligibility::Ineligible(IneligibleReason::AutoReplyDisabled);
        }
        if self.is_thinking {
            return Eligibility::Ineligible(IneligibleReason::Thinking);
        }
        if own_message && !self.respond_to_self {
            return Eligibility::Ineligible(IneligibleReason::OwnMessage);
        }
        if let Some(silence) = self.silence(now)
            && silence < min_delay
        {
            return Eligibility::Ineligible(IneligibleReason::TooSoon);
        }

        Eligibility::AutoReply
    }
}
