//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod agents;
mod discussion;
mod output;
mod personas;
mod scheduler;

pub use agents::FileAgentsConfig;
pub use discussion::FileDiscussionConfig;
pub use output::FileOutputConfig;
pub use personas::{FilePersona, default_personas};
pub use scheduler::FileSchedulerConfig;

use roundtable_application::RoundtableConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("scheduler.speak_timeout_secs cannot be 0")]
    InvalidTimeout,

    #[error("scheduler.round_limit cannot be 0")]
    InvalidRoundLimit,

    #[error("scheduler.scoring: {0}")]
    InvalidScoring(String),

    #[error("personas[{0}]: name cannot be empty")]
    EmptyPersonaName(usize),

    #[error("personas[{0}]: id cannot be empty")]
    EmptyPersonaId(usize),

    #[error("duplicate persona id: {0}")]
    DuplicatePersona(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Round budget, speak timeout and scoring weights
    pub scheduler: FileSchedulerConfig,
    /// How agents produce their replies
    pub agents: FileAgentsConfig,
    /// Settings of the discussion the CLI seeds
    pub discussion: FileDiscussionConfig,
    /// Agents taking part; built-in personas are used when empty
    pub personas: Vec<FilePersona>,
    /// Console output
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the configuration, stopping at the first problem.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.scheduler.speak_timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidTimeout);
        }
        if self.scheduler.round_limit == 0 {
            return Err(ConfigValidationError::InvalidRoundLimit);
        }
        if let Some(problem) = self.scheduler.scoring.problems().into_iter().next() {
            return Err(ConfigValidationError::InvalidScoring(problem));
        }

        let mut seen = HashSet::new();
        for (index, persona) in self.personas.iter().enumerate() {
            if persona.profile.id.is_empty() {
                return Err(ConfigValidationError::EmptyPersonaId(index));
            }
            if persona.profile.name.trim().is_empty() {
                return Err(ConfigValidationError::EmptyPersonaName(index));
            }
            if !seen.insert(persona.profile.id.as_str()) {
                return Err(ConfigValidationError::DuplicatePersona(
                    persona.profile.id.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Configured personas, or the built-in cast when none are configured
    pub fn personas_or_default(&self) -> Vec<FilePersona> {
        if self.personas.is_empty() {
            default_personas()
        } else {
            self.personas.clone()
        }
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Application configuration derived from this file
    pub fn to_roundtable_config(&self) -> RoundtableConfig {
        RoundtableConfig::default()
            .with_scheduler(self.scheduler.to_scheduler_config())
            .with_agents(self.agents.to_behavior())
    }
}
