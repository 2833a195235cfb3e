//! Per-discussion settings.
//!
//! Only `round_limit` and `min_response_delay_ms` are interpreted by the
//! core; the rest travel to the generation backend untouched.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStyle {
    Strict,
    #[default]
    Relaxed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionSettings {
    pub max_rounds: u32,
    pub temperature: f32,
    pub interval_ms: u64,
    pub moderation_style: ModerationStyle,
    pub focus_topics: Vec<String>,
    pub allow_conflict: bool,
    pub concise_mode: bool,
    pub concise_limit: u32,
    /// Minimum time between two auto-replies of the same agent
    pub min_response_delay_ms: u64,
    /// Granted turns before the discussion pauses itself
    pub round_limit: u32,
}

impl Default for DiscussionSettings {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            temperature: 0.7,
            interval_ms: 3000,
            moderation_style: ModerationStyle::Relaxed,
            focus_topics: Vec::new(),
            allow_conflict: true,
            concise_mode: false,
            concise_limit: 500,
            min_response_delay_ms: 0,
            round_limit: 20,
        }
    }
}

impl DiscussionSettings {
    pub fn min_response_delay(&self) -> Duration {
        Duration::from_millis(self.min_response_delay_ms)
    }

    /// A zero round limit would exhaust the scheduler before the first turn.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.round_limit == 0 {
            return Err(DomainError::ZeroRoundLimit);
        }
        Ok(())
    }
}
