//! Discussion repository port
//!
//! Key-value style persistence for discussions, their messages and members,
//! plus the agent profile catalogue. Keyed by discussion id.

use async_trait::async_trait;
use roundtable_domain::{
    AgentProfile, Discussion, DiscussionId, Member, Message, MessageId, NewMessage,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Discussion not found: {0}")]
    DiscussionNotFound(DiscussionId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DiscussionRepository: Send + Sync {
    // ==================== Messages ====================

    /// Persist a new message; the repository assigns its id
    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError>;

    async fn update_message(&self, message: &Message) -> Result<(), StorageError>;

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StorageError>;

    /// Messages of a discussion in creation order
    async fn list_messages(&self, discussion_id: &DiscussionId)
    -> Result<Vec<Message>, StorageError>;

    // ==================== Discussions ====================

    async fn get_discussion(&self, id: &DiscussionId) -> Result<Option<Discussion>, StorageError>;

    async fn list_discussions(&self) -> Result<Vec<Discussion>, StorageError>;

    async fn update_discussion(&self, discussion: &Discussion) -> Result<(), StorageError>;

    // ==================== Members ====================

    async fn list_members(&self, discussion_id: &DiscussionId)
    -> Result<Vec<Member>, StorageError>;

    async fn update_members(
        &self,
        discussion_id: &DiscussionId,
        members: &[Member],
    ) -> Result<(), StorageError>;

    // ==================== Agents ====================

    async fn list_agents(&self) -> Result<Vec<AgentProfile>, StorageError>;
}
