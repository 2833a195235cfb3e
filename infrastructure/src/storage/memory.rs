//! In-memory discussion repository.
//!
//! Everything lives in maps keyed by discussion id; message ids are issued
//! sequentially (`msg-1`, `msg-2`, ...). Nothing survives the process.

use async_trait::async_trait;
use roundtable_application::{DiscussionRepository, StorageError};
use roundtable_domain::{
    AgentProfile, Discussion, DiscussionId, Member, Message, MessageId, NewMessage,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    discussions: HashMap<DiscussionId, Discussion>,
    /// Messages per discussion, in creation order
    messages: HashMap<DiscussionId, Vec<Message>>,
    members: HashMap<DiscussionId, Vec<Member>>,
    agents: Vec<AgentProfile>,
}

/// Thread-safe, process-local [`DiscussionRepository`]
#[derive(Default)]
pub struct InMemoryDiscussionRepository {
    tables: RwLock<Tables>,
    next_message: AtomicU64,
}

impl InMemoryDiscussionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_message_id(&self) -> MessageId {
        let n = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::new(format!("msg-{n}"))
    }

    // ==================== Seeding ====================

    pub fn seed_discussion(&self, discussion: Discussion) {
        let mut tables = self.write();
        tables.messages.entry(discussion.id.clone()).or_default();
        tables.discussions.insert(discussion.id.clone(), discussion);
    }

    /// Add profiles to the catalogue, replacing any with the same id
    pub fn seed_agents(&self, profiles: impl IntoIterator<Item = AgentProfile>) {
        let mut tables = self.write();
        for profile in profiles {
            tables.agents.retain(|p| p.id != profile.id);
            tables.agents.push(profile);
        }
    }

    pub fn seed_members(&self, discussion_id: &DiscussionId, members: Vec<Member>) {
        self.write().members.insert(discussion_id.clone(), members);
    }

    pub fn seed_message(&self, message: NewMessage) -> Message {
        let message = message.into_message(self.next_message_id());
        self.write()
            .messages
            .entry(message.discussion_id.clone())
            .or_default()
            .push(message.clone());
        message
    }

    pub fn message_count(&self, discussion_id: &DiscussionId) -> usize {
        self.read()
            .messages
            .get(discussion_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl DiscussionRepository for InMemoryDiscussionRepository {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        if !self.read().discussions.contains_key(&message.discussion_id) {
            return Err(StorageError::DiscussionNotFound(message.discussion_id));
        }
        Ok(self.seed_message(message))
    }

    async fn update_message(&self, message: &Message) -> Result<(), StorageError> {
        let mut tables = self.write();
        let slot = tables
            .messages
            .get_mut(&message.discussion_id)
            .and_then(|messages| messages.iter_mut().find(|m| m.id == message.id))
            .ok_or_else(|| StorageError::MessageNotFound(message.id.clone()))?;
        *slot = message.clone();
        Ok(())
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StorageError> {
        Ok(self
            .read()
            .messages
            .values()
            .flatten()
            .find(|m| &m.id == id)
            .cloned())
    }

    async fn list_messages(
        &self,
        discussion_id: &DiscussionId,
    ) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .read()
            .messages
            .get(discussion_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_discussion(&self, id: &DiscussionId) -> Result<Option<Discussion>, StorageError> {
        Ok(self.read().discussions.get(id).cloned())
    }

    async fn list_discussions(&self) -> Result<Vec<Discussion>, StorageError> {
        let mut discussions: Vec<Discussion> = self.read().discussions.values().cloned().collect();
        discussions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(discussions)
    }

    async fn update_discussion(&self, discussion: &Discussion) -> Result<(), StorageError> {
        let mut tables = self.write();
        let slot = tables
            .discussions
            .get_mut(&discussion.id)
            .ok_or_else(|| StorageError::DiscussionNotFound(discussion.id.clone()))?;
        *slot = discussion.clone();
        Ok(())
    }

    async fn list_members(
        &self,
        discussion_id: &DiscussionId,
    ) -> Result<Vec<Member>, StorageError> {
        Ok(self
            .read()
            .members
            .get(discussion_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_members(
        &self,
        discussion_id: &DiscussionId,
        members: &[Member],
    ) -> Result<(), StorageError> {
        let mut tables = self.write();
        if !tables.discussions.contains_key(discussion_id) {
            return Err(StorageError::DiscussionNotFound(discussion_id.clone()));
        }
        tables
            .members
            .insert(discussion_id.clone(), members.to_vec());
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>, StorageError> {
        Ok(self.read().agents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_domain::{AgentRole, MessageStatus};

    fn repo() -> (InMemoryDiscussionRepository, DiscussionId) {
        let repo = InMemoryDiscussionRepository::new();
        let id = DiscussionId::new("d1");
        repo.seed_discussion(Discussion::new(id.clone(), "Test"));
        (repo, id)
    }

    #[tokio::test]
    async fn test_message_ids_are_sequential() {
        let (repo, id) = repo();
        let first = repo.create_message(NewMessage::user(id.clone(), "a")).await.unwrap();
        let second = repo.create_message(NewMessage::user(id.clone(), "b")).await.unwrap();
        assert_eq!(first.id.as_str(), "msg-1");
        assert_eq!(second.id.as_str(), "msg-2");

        let listed = repo.list_messages(&id).await.unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[tokio::test]
    async fn test_messages_need_a_discussion() {
        let (repo, _) = repo();
        let result = repo
            .create_message(NewMessage::user(DiscussionId::new("ghost"), "hi"))
            .await;
        assert!(matches!(result, Err(StorageError::DiscussionNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_message_replaces_in_place() {
        let (repo, id) = repo();
        let mut message = repo
            .create_message(NewMessage::user(id.clone(), "").with_status(MessageStatus::Streaming))
            .await
            .unwrap();
        message.append_chunk("done");
        message.complete();
        repo.update_message(&message).await.unwrap();

        let stored = repo.get_message(&message.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "done");
        assert_eq!(stored.status, MessageStatus::Completed);
        assert_eq!(repo.message_count(&id), 1);

        let mut unknown = message.clone();
        unknown.id = MessageId::new("msg-99");
        assert!(repo.update_message(&unknown).await.is_err());
    }

    #[tokio::test]
    async fn test_members_and_agents() {
        let (repo, id) = repo();
        repo.seed_agents([
            AgentProfile::new("ada", "Ada", AgentRole::Participant),
            AgentProfile::new("ada", "Ada Again", AgentRole::Moderator),
        ]);
        let agents = repo.list_agents().await.unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Ada Again");

        repo.update_members(&id, &[Member::new("ada", true)]).await.unwrap();
        assert_eq!(repo.list_members(&id).await.unwrap().len(), 1);
        assert!(repo.list_members(&DiscussionId::new("d2")).await.unwrap().is_empty());
        assert!(
            repo.update_members(&DiscussionId::new("d2"), &[])
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_update_discussion() {
        let (repo, id) = repo();
        let mut discussion = repo.get_discussion(&id).await.unwrap().unwrap();
        discussion.topic = "Lifetimes".to_string();
        repo.update_discussion(&discussion).await.unwrap();
        assert_eq!(repo.get_discussion(&id).await.unwrap().unwrap().topic, "Lifetimes");
        assert_eq!(repo.list_discussions().await.unwrap().len(), 1);
    }
}
