//! Agent behavior: how agents generate and when they may answer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBehavior {
    /// Stream replies chunk by chunk instead of producing them whole
    pub streaming: bool,
    /// Let agents auto-reply to their own messages
    pub respond_to_self: bool,
    /// Floor for the inter-response delay; a discussion's
    /// `min_response_delay_ms` can raise it
    pub min_response_delay: Duration,
}

impl Default for AgentBehavior {
    fn default() -> Self {
        Self {
            streaming: true,
            respond_to_self: false,
            min_response_delay: Duration::ZERO,
        }
    }
}

impl AgentBehavior {
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_respond_to_self(mut self, respond: bool) -> Self {
        self.respond_to_self = respond;
        self
    }

    pub fn with_min_response_delay(mut self, delay: Duration) -> Self {
        self.min_response_delay = delay;
        self
    }

    /// Effective delay given a discussion-level setting
    pub fn effective_delay(&self, discussion_delay: Duration) -> Duration {
        self.min_response_delay.max(discussion_delay)
    }
}
