//! Generation context handed to a backend for one turn

use crate::agent::profile::AgentProfile;
use crate::core::ids::DiscussionId;
use crate::core::string::truncate;
use crate::discussion::message::{Author, Message};
use crate::discussion::settings::DiscussionSettings;

/// Everything a backend needs to produce one agent's reply.
///
/// `settings` already has the speaking agent's concise-mode override applied.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub discussion_id: DiscussionId,
    pub agent: AgentProfile,
    pub members: Vec<AgentProfile>,
    pub settings: DiscussionSettings,
    pub topic: String,
    pub history: Vec<Message>,
    pub trigger: Message,
}

impl GenerationContext {
    /// Display name for a message author, resolved against the members
    pub fn author_name(&self, author: &Author) -> String {
        match author {
            Author::User => "user".to_string(),
            Author::System => "system".to_string(),
            Author::Agent(id) => self
                .members
                .iter()
                .find(|m| &m.id == id)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// Names of the other members (excluding the speaker)
    pub fn peer_names(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| m.id != self.agent.id)
            .map(|m| m.name.as_str())
            .collect()
    }

    /// Short excerpt of the triggering message
    pub fn trigger_excerpt(&self, max_len: usize) -> String {
        truncate(self.trigger.content.trim(), max_len)
    }

    /// Maximum reply length in bytes when concise mode is on
    pub fn length_limit(&self) -> Option<usize> {
        self.settings
            .concise_mode
            .then_some(self.settings.concise_limit as usize)
    }
}
