//! Discussion messages

use crate::core::ids::{AgentId, DiscussionId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Appended to the content of a streamed message cut short by the scheduler.
pub const INTERRUPTED_MARKER: &str = "\n[interrupted]";

/// Who wrote a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Author {
    User,
    Agent(AgentId),
    System,
}

impl Author {
    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Author::Agent(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_agent(&self, id: &AgentId) -> bool {
        self.agent_id() == Some(id)
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Agent(id) => write!(f, "{}", id),
            Author::System => write!(f, "system"),
        }
    }
}

/// Delivery status of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    /// Content is still being appended chunk by chunk
    Streaming,
    #[default]
    Completed,
    Error,
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Completed | MessageStatus::Error)
    }
}

/// A message in a discussion log (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub discussion_id: DiscussionId,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub status: MessageStatus,
    pub last_update: DateTime<Utc>,
    /// The message this one answers
    #[serde(default)]
    pub origin_message_id: Option<MessageId>,
}

impl Message {
    pub fn is_from(&self, id: &AgentId) -> bool {
        self.author.is_agent(id)
    }

    /// A completed user or agent message that can re-trigger responses on resume
    pub fn is_replayable(&self) -> bool {
        self.status == MessageStatus::Completed && self.author != Author::System
    }

    pub fn append_chunk(&mut self, chunk: &str) {
        self.content.push_str(chunk);
        self.last_update = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = MessageStatus::Completed;
        self.last_update = Utc::now();
    }

    /// Finalize a streamed message that was cut short.
    pub fn complete_interrupted(&mut self) {
        self.content.push_str(INTERRUPTED_MARKER);
        self.complete();
    }

    pub fn fail(&mut self) {
        self.status = MessageStatus::Error;
        self.last_update = Utc::now();
    }
}

/// A message that has not been persisted yet (no id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub discussion_id: DiscussionId,
    pub author: Author,
    pub content: String,
    pub status: MessageStatus,
    pub origin_message_id: Option<MessageId>,
}

impl NewMessage {
    pub fn new(discussion_id: DiscussionId, author: Author, content: impl Into<String>) -> Self {
        Self {
            discussion_id,
            author,
            content: content.into(),
            status: MessageStatus::Completed,
            origin_message_id: None,
        }
    }

    pub fn user(discussion_id: DiscussionId, content: impl Into<String>) -> Self {
        Self::new(discussion_id, Author::User, content)
    }

    pub fn system(discussion_id: DiscussionId, content: impl Into<String>) -> Self {
        Self::new(discussion_id, Author::System, content)
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }

    pub fn in_reply_to(mut self, origin: MessageId) -> Self {
        self.origin_message_id = Some(origin);
        self
    }

    /// Attach the id assigned by storage.
    pub fn into_message(self, id: MessageId) -> Message {
        let now = Utc::now();
        Message {
            id,
            discussion_id: self.discussion_id,
            author: self.author,
            content: self.content,
            timestamp: now,
            status: self.status,
            last_update: now,
            origin_message_id: self.origin_message_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming() -> Message {
        NewMessage::new(
            DiscussionId::new("d"),
            Author::Agent(AgentId::new("a")),
            "",
        )
        .with_status(MessageStatus::Streaming)
        .into_message(MessageId::new("m1"))
    }

    #[test]
    fn test_interrupted_marker_is_appended() {
        let mut message = streaming();
        message.append_chunk("Half a");
        message.append_chunk(" thought");
        message.complete_interrupted();
        assert_eq!(message.content, "Half a thought\n[interrupted]");
        assert_eq!(message.status, MessageStatus::Completed);
    }

    #[test]
    fn test_streaming_message_is_not_replayable() {
        let mut message = streaming();
        assert!(!message.is_replayable());
        message.fail();
        assert!(!message.is_replayable());
        assert!(message.status.is_terminal());
    }

    #[test]
    fn test_system_notice_is_not_replayable() {
        let notice = NewMessage::system(DiscussionId::new("d1"), "paused")
            .into_message(MessageId::new("m9"));
        assert_eq!(notice.status, MessageStatus::Completed);
        assert!(!notice.is_replayable());
    }

    #[test]
    fn test_author_serialization() {
        let json = serde_json::to_value(Author::Agent(AgentId::new("a1"))).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "agent", "id": "a1"}));
        let json = serde_json::to_value(Author::System).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "system"}));
    }
}
