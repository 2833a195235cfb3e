//! Scheduler notifications

use crate::core::ids::AgentId;
use serde::{Deserialize, Serialize};

/// Sequence number of a granted turn. Strictly increasing per scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(pub u64);

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// The floor was handed to `agent_id`
    Granted { agent_id: AgentId, turn: TurnId },
    /// The floor was freed: completion, abandonment, timeout, pause or clear
    Released { agent_id: AgentId, turn: TurnId },
    /// Round counter after a completed turn
    MessageProcessed { count: u32 },
    /// The round budget is spent; no grants until the counter is reset
    LimitReached { limit: u32 },
    SpeakTimeout { agent_id: AgentId },
    SpeakInterrupted { agent_id: AgentId },
}

impl SchedulerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SchedulerEvent::Granted { .. } => "granted",
            SchedulerEvent::Released { .. } => "released",
            SchedulerEvent::MessageProcessed { .. } => "message_processed",
            SchedulerEvent::LimitReached { .. } => "limit_reached",
            SchedulerEvent::SpeakTimeout { .. } => "speak_timeout",
            SchedulerEvent::SpeakInterrupted { .. } => "speak_interrupted",
        }
    }

    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            SchedulerEvent::Granted { agent_id, .. }
            | SchedulerEvent::Released { agent_id, .. }
            | SchedulerEvent::SpeakTimeout { agent_id }
            | SchedulerEvent::SpeakInterrupted { agent_id } => Some(agent_id),
            _ => None,
        }
    }
}
