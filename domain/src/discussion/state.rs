//! Discussion aggregate state.
//!
//! [`DiscussionState`] is only changed through its transition methods. Each
//! method validates its input first and returns a [`DomainError`] without
//! touching the state when the transition is illegal; every committed
//! transition bumps [`DiscussionState::version`].

use super::member::Member;
use super::message::Message;
use super::settings::DiscussionSettings;
use crate::core::error::DomainError;
use crate::core::ids::DiscussionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A persisted discussion record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub id: DiscussionId,
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub settings: DiscussionSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discussion {
    pub fn new(id: impl Into<DiscussionId>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            topic: String::new(),
            settings: DiscussionSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_settings(mut self, settings: DiscussionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Aggregate state of the active discussion
#[derive(Debug, Clone, PartialEq)]
pub struct DiscussionState {
    discussion_id: Option<DiscussionId>,
    messages: Vec<Message>,
    members: Vec<Member>,
    paused: bool,
    current_round: u32,
    current_speaker: Option<usize>,
    settings: DiscussionSettings,
    topic: String,
    version: u64,
}

impl Default for DiscussionState {
    fn default() -> Self {
        Self {
            discussion_id: None,
            messages: Vec::new(),
            members: Vec::new(),
            paused: true,
            current_round: 0,
            current_speaker: None,
            settings: DiscussionSettings::default(),
            topic: String::new(),
            version: 0,
        }
    }
}

impl DiscussionState {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    pub fn discussion_id(&self) -> Option<&DiscussionId> {
        self.discussion_id.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn settings(&self) -> &DiscussionSettings {
        &self.settings
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Index of the member holding the floor, `-1` when nobody speaks
    pub fn current_speaker_index(&self) -> isize {
        self.current_speaker.map_or(-1, |i| i as isize)
    }

    pub fn current_speaker(&self) -> Option<&Member> {
        self.current_speaker.and_then(|i| self.members.get(i))
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn has_history(&self) -> bool {
        !self.messages.is_empty()
    }

    // ==================== Transitions ====================

    fn commit(&mut self) {
        self.version += 1;
    }

    pub fn set_discussion_id(&mut self, id: Option<DiscussionId>) {
        if self.discussion_id != id {
            self.discussion_id = id;
            self.commit();
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.commit();
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) {
        self.topic = topic.into();
        self.commit();
    }

    pub fn set_settings(&mut self, settings: DiscussionSettings) {
        self.settings = settings;
        self.commit();
    }

    /// Replace the membership list; ids must be non-empty and unique.
    pub fn set_members(&mut self, members: Vec<Member>) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        for member in &members {
            if member.agent_id.is_empty() {
                return Err(DomainError::EmptyMemberId);
            }
            if !seen.insert(&member.agent_id) {
                return Err(DomainError::DuplicateMember(member.agent_id.clone()));
            }
        }

        // keep pointing at the same agent if it is still a member
        let speaker = self
            .current_speaker()
            .map(|m| m.agent_id.clone())
            .and_then(|id| members.iter().position(|m| m.agent_id == id));

        self.members = members;
        self.current_speaker = speaker;
        self.commit();
        Ok(())
    }

    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.commit();
    }

    /// Append a message, or replace it in place when the id is already logged.
    pub fn upsert_message(&mut self, message: Message) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
        self.commit();
    }

    pub fn increment_round(&mut self) {
        self.current_round = self.current_round.saturating_add(1);
        self.commit();
    }

    pub fn set_round(&mut self, round: i64) -> Result<(), DomainError> {
        if round < 0 {
            return Err(DomainError::NegativeRound(round));
        }
        self.current_round = u32::try_from(round).unwrap_or(u32::MAX);
        self.commit();
        Ok(())
    }

    /// Set the speaker index; `-1` clears it.
    pub fn set_current_speaker_index(&mut self, index: isize) -> Result<(), DomainError> {
        let members = self.members.len();
        if index < -1 || index >= members as isize {
            return Err(DomainError::SpeakerIndexOutOfRange { index, members });
        }
        self.current_speaker = usize::try_from(index).ok();
        self.commit();
        Ok(())
    }

    /// Reset the per-discussion counters and park the discussion.
    pub fn reset_discussion_state(&mut self) {
        self.current_round = 0;
        self.current_speaker = None;
        self.paused = true;
        self.commit();
    }

    /// Back to the initial state; the version keeps counting.
    pub fn reset_all(&mut self) {
        let version = self.version;
        *self = Self {
            version,
            ..Self::default()
        };
        self.commit();
    }
}
