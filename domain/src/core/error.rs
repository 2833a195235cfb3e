//! Domain error types

use crate::agent::runtime_state::TurnPhase;
use crate::core::ids::{AgentId, MessageId};
use thiserror::Error;

/// Domain-level errors
///
/// Every variant describes a transition that was rejected *before* any
/// state was mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Round counter cannot be negative (got {0})")]
    NegativeRound(i64),

    #[error("Speaker index {index} is out of range (-1..{members})")]
    SpeakerIndexOutOfRange { index: isize, members: usize },

    #[error("Member id cannot be empty")]
    EmptyMemberId,

    #[error("Duplicate member: {0}")]
    DuplicateMember(AgentId),

    #[error("Agent name cannot be empty")]
    EmptyAgentName,

    #[error("Invalid mention pattern for '{name}': {reason}")]
    InvalidMentionPattern { name: String, reason: String },

    #[error("Invalid turn transition: {from} -> {to}")]
    InvalidTurnTransition { from: TurnPhase, to: TurnPhase },

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Round limit must be at least 1")]
    ZeroRoundLimit,
}

impl DomainError {
    /// Check if this error came from validating discussion state
    pub fn is_state_violation(&self) -> bool {
        matches!(
            self,
            DomainError::NegativeRound(_)
                | DomainError::SpeakerIndexOutOfRange { .. }
                | DomainError::EmptyMemberId
                | DomainError::DuplicateMember(_)
                | DomainError::ZeroRoundLimit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_round_display() {
        let error = DomainError::NegativeRound(-1);
        assert_eq!(error.to_string(), "Round counter cannot be negative (got -1)");
    }

    #[test]
    fn test_state_violation_check() {
        assert!(DomainError::NegativeRound(-3).is_state_violation());
        assert!(DomainError::DuplicateMember(AgentId::new("a")).is_state_violation());
        assert!(DomainError::ZeroRoundLimit.is_state_violation());
        assert!(!DomainError::EmptyAgentName.is_state_violation());
        assert!(
            !DomainError::InvalidTurnTransition {
                from: TurnPhase::Paused,
                to: TurnPhase::Speaking,
            }
            .is_state_violation()
        );
    }
}
