//! Hand-written port doubles shared by the application tests.

use crate::ports::generation::{GenerationBackend, GenerationError, StreamHandle};
use crate::ports::storage::{DiscussionRepository, StorageError};
use async_trait::async_trait;
use roundtable_domain::{
    AgentProfile, AgentRole, Discussion, DiscussionId, GenerationContext, Member, Message,
    MessageId, NewMessage, StreamEvent,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted backend reply
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// Streamed chunk by chunk with a pause before each chunk
    Chunks(Vec<String>, Duration),
    Fail(String),
    /// Stream some chunks, then report an error
    FailMidStream(Vec<String>, String),
}

/// Backend that plays back queued replies; "ok" once the queue is empty
#[derive(Default)]
pub struct ScriptedGeneration {
    replies: Mutex<VecDeque<Reply>>,
    pub calls: Mutex<Vec<GenerationContext>>,
}

impl ScriptedGeneration {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn next(&self, context: &GenerationContext) -> Reply {
        self.calls.lock().unwrap().push(context.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Text("ok".to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedGeneration {
    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        match self.next(context) {
            Reply::Text(text) => Ok(text),
            Reply::Chunks(chunks, delay) => {
                tokio::time::sleep(delay * chunks.len() as u32).await;
                Ok(chunks.concat())
            }
            Reply::Fail(e) | Reply::FailMidStream(_, e) => Err(GenerationError::Backend(e)),
        }
    }

    async fn stream_generate(
        &self,
        context: &GenerationContext,
    ) -> Result<StreamHandle, GenerationError> {
        let reply = self.next(context);
        let (tx, rx) = mpsc::channel(8);
        match reply {
            Reply::Fail(e) => return Err(GenerationError::Backend(e)),
            Reply::Text(text) => {
                tokio::spawn(async move {
                    let _ = tx.send(StreamEvent::Delta(text.clone())).await;
                    let _ = tx.send(StreamEvent::Completed(text)).await;
                });
            }
            Reply::Chunks(chunks, delay) => {
                tokio::spawn(async move {
                    let full = chunks.concat();
                    for chunk in chunks {
                        tokio::time::sleep(delay).await;
                        if tx.send(StreamEvent::Delta(chunk)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(StreamEvent::Completed(full)).await;
                });
            }
            Reply::FailMidStream(chunks, e) => {
                tokio::spawn(async move {
                    for chunk in chunks {
                        let _ = tx.send(StreamEvent::Delta(chunk)).await;
                    }
                    let _ = tx.send(StreamEvent::Error(e)).await;
                });
            }
        }
        Ok(StreamHandle::new(rx))
    }
}

/// Map-backed repository
#[derive(Default)]
pub struct MemoryRepository {
    discussions: Mutex<HashMap<DiscussionId, Discussion>>,
    messages: Mutex<Vec<Message>>,
    members: Mutex<HashMap<DiscussionId, Vec<Member>>>,
    agents: Mutex<Vec<AgentProfile>>,
    next_id: Mutex<u64>,
}

impl MemoryRepository {
    pub fn with_discussion(discussion: Discussion) -> Self {
        let repo = Self::default();
        repo.discussions
            .lock()
            .unwrap()
            .insert(discussion.id.clone(), discussion);
        repo
    }

    pub fn add_agent(&self, profile: AgentProfile) {
        self.agents.lock().unwrap().push(profile);
    }

    pub fn set_members(&self, discussion_id: &DiscussionId, members: Vec<Member>) {
        self.members
            .lock()
            .unwrap()
            .insert(discussion_id.clone(), members);
    }

    pub fn add_discussion(&self, discussion: Discussion) {
        self.discussions
            .lock()
            .unwrap()
            .insert(discussion.id.clone(), discussion);
    }

    pub fn insert(&self, message: NewMessage) -> Message {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let message = message.into_message(MessageId::new(format!("m{}", *next)));
        self.messages.lock().unwrap().push(message.clone());
        message
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscussionRepository for MemoryRepository {
    async fn create_message(&self, message: NewMessage) -> Result<Message, StorageError> {
        Ok(self.insert(message))
    }

    async fn update_message(&self, message: &Message) -> Result<(), StorageError> {
        let mut messages = self.messages.lock().unwrap();
        let slot = messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| StorageError::MessageNotFound(message.id.clone()))?;
        *slot = message.clone();
        Ok(())
    }

    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StorageError> {
        Ok(self.messages.lock().unwrap().iter().find(|m| &m.id == id).cloned())
    }

    async fn list_messages(
        &self,
        discussion_id: &DiscussionId,
    ) -> Result<Vec<Message>, StorageError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| &m.discussion_id == discussion_id)
            .cloned()
            .collect())
    }

    async fn get_discussion(&self, id: &DiscussionId) -> Result<Option<Discussion>, StorageError> {
        Ok(self.discussions.lock().unwrap().get(id).cloned())
    }

    async fn list_discussions(&self) -> Result<Vec<Discussion>, StorageError> {
        Ok(self.discussions.lock().unwrap().values().cloned().collect())
    }

    async fn update_discussion(&self, discussion: &Discussion) -> Result<(), StorageError> {
        self.add_discussion(discussion.clone());
        Ok(())
    }

    async fn list_members(
        &self,
        discussion_id: &DiscussionId,
    ) -> Result<Vec<Member>, StorageError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(discussion_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_members(
        &self,
        discussion_id: &DiscussionId,
        members: &[Member],
    ) -> Result<(), StorageError> {
        self.set_members(discussion_id, members.to_vec());
        Ok(())
    }

    async fn list_agents(&self) -> Result<Vec<AgentProfile>, StorageError> {
        Ok(self.agents.lock().unwrap().clone())
    }
}

pub fn moderator(id: &str, name: &str) -> AgentProfile {
    AgentProfile::new(id, name, AgentRole::Moderator)
}

pub fn participant(id: &str, name: &str) -> AgentProfile {
    AgentProfile::new(id, name, AgentRole::Participant)
}
