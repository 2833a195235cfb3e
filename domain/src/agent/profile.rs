//! Agent persona configuration.
//!
//! The persona text (prompt, personality, bias, ...) is opaque to the core:
//! it is only carried into the generation context. The scheduler cares about
//! the display name (mentions) and the role (moderator boost).

use crate::core::error::DomainError;
use crate::core::ids::AgentId;
use serde::{Deserialize, Serialize};

/// Role of an agent in a discussion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Steers the discussion; its speak requests are boosted
    Moderator,
    #[default]
    Participant,
}

impl AgentRole {
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Moderator => "moderator",
            AgentRole::Participant => "participant",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static persona configuration of an agent (Entity)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: AgentId,
    /// Display name, also the token matched by `@name` mentions
    pub name: String,
    #[serde(default)]
    pub role: AgentRole,
    /// Behavioural directives handed to the generation backend
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub bias: String,
    #[serde(default)]
    pub response_style: String,
    /// Ask the backend for short replies
    #[serde(default)]
    pub concise_mode: bool,
}

impl AgentProfile {
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            prompt: String::new(),
            personality: String::new(),
            expertise: Vec::new(),
            bias: String::new(),
            response_style: String::new(),
            concise_mode: false,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_expertise(mut self, expertise: Vec<String>) -> Self {
        self.expertise = expertise;
        self
    }

    pub fn is_moderator(&self) -> bool {
        self.role == AgentRole::Moderator
    }

    /// Validate the profile before it joins a discussion
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.is_empty() {
            return Err(DomainError::EmptyMemberId);
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::EmptyAgentName);
        }
        Ok(())
    }
}
