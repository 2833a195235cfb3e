//! Agent behaviour from TOML (`[agents]` section)

use roundtable_application::AgentBehavior;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAgentsConfig {
    /// Stream replies chunk by chunk
    pub streaming: bool,
    /// Let agents auto-reply to their own messages
    pub respond_to_self: bool,
    /// Minimum time between two auto-replies of the same agent
    pub min_response_delay_ms: u64,
}

impl Default for FileAgentsConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            respond_to_self: false,
            min_response_delay_ms: 0,
        }
    }
}

impl FileAgentsConfig {
    pub fn to_behavior(&self) -> AgentBehavior {
        AgentBehavior::default()
            .with_streaming(self.streaming)
            .with_respond_to_self(self.respond_to_self)
            .with_min_response_delay(Duration::from_millis(self.min_response_delay_ms))
    }
}
