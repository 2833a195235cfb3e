//! Discussion-level errors

use crate::ports::storage::StorageError;
use roundtable_domain::{AgentId, DiscussionId, DomainError, MessageId};
use std::fmt;
use thiserror::Error;

/// Where an error happened, as far as it is known
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub discussion_id: Option<DiscussionId>,
    pub agent_id: Option<AgentId>,
    pub message_id: Option<MessageId>,
}

impl ErrorContext {
    pub fn discussion(id: DiscussionId) -> Self {
        Self {
            discussion_id: Some(id),
            ..Default::default()
        }
    }

    pub fn with_agent(mut self, id: AgentId) -> Self {
        self.agent_id = Some(id);
        self
    }

    pub fn with_message(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.discussion_id {
            parts.push(format!("discussion={id}"));
        }
        if let Some(id) = &self.agent_id {
            parts.push(format!("agent={id}"));
        }
        if let Some(id) = &self.message_id {
            parts.push(format!("message={id}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscussionErrorKind {
    NoHistory,
    NoParticipants,
    InvalidTransition,
    Storage,
    GenerateResponse,
    NoDiscussion,
}

impl DiscussionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscussionErrorKind::NoHistory => "no_history",
            DiscussionErrorKind::NoParticipants => "no_participants",
            DiscussionErrorKind::InvalidTransition => "invalid_transition",
            DiscussionErrorKind::Storage => "storage",
            DiscussionErrorKind::GenerateResponse => "generate_response",
            DiscussionErrorKind::NoDiscussion => "no_discussion",
        }
    }
}

/// Errors reported by the discussion lifecycle
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscussionError {
    #[error("Discussion has no messages to resume from")]
    NoHistory { context: ErrorContext },

    #[error("Discussion has no participants")]
    NoParticipants { context: ErrorContext },

    #[error("Invalid state transition: {source}")]
    InvalidTransition {
        source: DomainError,
        context: ErrorContext,
    },

    #[error("Storage error: {source}")]
    Storage {
        source: StorageError,
        context: ErrorContext,
    },

    #[error("Failed to generate a response: {reason}")]
    GenerateResponse {
        reason: String,
        context: ErrorContext,
    },

    #[error("No discussion selected or found")]
    NoDiscussion { context: ErrorContext },
}

impl DiscussionError {
    pub fn kind(&self) -> DiscussionErrorKind {
        match self {
            DiscussionError::NoHistory { .. } => DiscussionErrorKind::NoHistory,
            DiscussionError::NoParticipants { .. } => DiscussionErrorKind::NoParticipants,
            DiscussionError::InvalidTransition { .. } => DiscussionErrorKind::InvalidTransition,
            DiscussionError::Storage { .. } => DiscussionErrorKind::Storage,
            DiscussionError::GenerateResponse { .. } => DiscussionErrorKind::GenerateResponse,
            DiscussionError::NoDiscussion { .. } => DiscussionErrorKind::NoDiscussion,
        }
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            DiscussionError::NoHistory { context }
            | DiscussionError::NoParticipants { context }
            | DiscussionError::InvalidTransition { context, .. }
            | DiscussionError::Storage { context, .. }
            | DiscussionError::GenerateResponse { context, .. }
            | DiscussionError::NoDiscussion { context } => context,
        }
    }

    /// Whether the discussion should be paused when this error is reported.
    ///
    /// Rejected transitions leave the state untouched and failed turns are
    /// recovered by the agent, so neither stops the discussion.
    pub fn should_pause(&self) -> bool {
        !matches!(
            self,
            DiscussionError::InvalidTransition { .. } | DiscussionError::GenerateResponse { .. }
        )
    }

    pub fn storage(source: StorageError, context: ErrorContext) -> Self {
        DiscussionError::Storage { source, context }
    }

    pub fn invalid(source: DomainError, context: ErrorContext) -> Self {
        DiscussionError::InvalidTransition { source, context }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_pause_by_kind() {
        let ctx = ErrorContext::discussion(DiscussionId::new("d1"));
        assert!(DiscussionError::NoHistory { context: ctx.clone() }.should_pause());
        assert!(DiscussionError::NoParticipants { context: ctx.clone() }.should_pause());
        assert!(
            DiscussionError::storage(StorageError::Backend("disk".into()), ctx.clone())
                .should_pause()
        );
        assert!(
            !DiscussionError::GenerateResponse {
                reason: "x".into(),
                context: ctx.clone()
            }
            .should_pause()
        );
        assert!(!DiscussionError::invalid(DomainError::NegativeRound(-1), ctx).should_pause());
    }

    #[test]
    fn test_context_is_carried() {
        let ctx = ErrorContext::discussion(DiscussionId::new("d1"))
            .with_agent(AgentId::new("a1"))
            .with_message(MessageId::new("m1"));
        let error = DiscussionError::storage(StorageError::Backend("disk".into()), ctx.clone());
        assert_eq!(error.context(), &ctx);
        assert_eq!(error.kind(), DiscussionErrorKind::Storage);
        assert_eq!(ctx.to_string(), "discussion=d1 agent=a1 message=m1");
        assert_eq!(error.to_string(), "Storage error: Storage backend error: disk");
    }
}
