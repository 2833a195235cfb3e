//! Events published on a discussion's environment bus

use super::message::Message;
use crate::core::ids::{AgentId, DiscussionId, MessageId};
use serde::{Deserialize, Serialize};

/// Events observed by agents, the lifecycle manager and the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscussionEvent {
    /// A finished message entered the discussion; agents evaluate it
    MessagePosted { message: Message },
    /// A message changed (placeholder created, chunk appended, finalized,
    /// system notice). Display only, agents ignore it.
    MessageUpdated { message: Message },
    Thinking { agent_id: AgentId, is_thinking: bool },
    Paused,
    Resumed,
    /// A turn ended because generation failed
    TurnFailed {
        discussion_id: DiscussionId,
        agent_id: AgentId,
        trigger_message_id: Option<MessageId>,
        error: String,
    },
}

impl DiscussionEvent {
    /// Event type identifier (e.g. for transcripts)
    pub fn event_type(&self) -> &'static str {
        match self {
            DiscussionEvent::MessagePosted { .. } => "message_posted",
            DiscussionEvent::MessageUpdated { .. } => "message_updated",
            DiscussionEvent::Thinking { .. } => "thinking",
            DiscussionEvent::Paused => "paused",
            DiscussionEvent::Resumed => "resumed",
            DiscussionEvent::TurnFailed { .. } => "turn_failed",
        }
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            DiscussionEvent::MessagePosted { message }
            | DiscussionEvent::MessageUpdated { message } => Some(message),
            _ => None,
        }
    }
}
