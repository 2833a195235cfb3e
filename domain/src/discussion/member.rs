//! Discussion membership

use crate::core::ids::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An agent's membership in a discussion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub agent_id: AgentId,
    /// Answer messages without being mentioned
    pub auto_reply: bool,
    pub joined_at: DateTime<Utc>,
}

impl Member {
    pub fn new(agent_id: impl Into<AgentId>, auto_reply: bool) -> Self {
        Self {
            agent_id: agent_id.into(),
            auto_reply,
            joined_at: Utc::now(),
        }
    }
}
