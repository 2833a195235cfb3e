//! Application configuration
//!
//! - [`SchedulerConfig`]: round budget, speak timeout, scoring weights
//! - [`AgentBehavior`]: how agents produce and gate their replies
//! - [`LifecycleConfig`]: resume timing for the discussion manager
//!
//! [`RoundtableConfig`] groups the three for wiring.

mod agent_behavior;
mod scheduler_config;

pub use agent_behavior::AgentBehavior;
pub use scheduler_config::SchedulerConfig;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the discussion lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay before the last message is replayed on resume
    pub settle_delay: Duration,
    /// How often readiness is re-checked while resuming
    pub ready_poll_interval: Duration,
    /// Give up waiting for readiness after this long
    pub ready_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(100),
            ready_poll_interval: Duration::from_millis(20),
            ready_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundtableConfig {
    pub scheduler: SchedulerConfig,
    pub agents: AgentBehavior,
    pub lifecycle: LifecycleConfig,
}

impl RoundtableConfig {
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_agents(mut self, agents: AgentBehavior) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: LifecycleConfig) -> Self {
        self.lifecycle = lifecycle;
        self
    }
}
