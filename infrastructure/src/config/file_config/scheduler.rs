//! Scheduler configuration from TOML (`[scheduler]` section)
//!
//! ```toml
//! [scheduler]
//! round_limit = 20          # granted turns before the discussion pauses
//! speak_timeout_secs = 30   # a speaker holding the floor longer is cut off
//!
//! [scheduler.scoring]
//! mentioned = 100.0
//! moderator_boost = 1.5
//! silence_cap_minutes = 5.0 # silence beyond this earns no extra score
//! ```

use roundtable_application::SchedulerConfig;
use roundtable_domain::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSchedulerConfig {
    pub round_limit: u32,
    pub speak_timeout_secs: u64,
    pub scoring: ScoringWeights,
}

impl Default for FileSchedulerConfig {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            round_limit: defaults.round_limit,
            speak_timeout_secs: defaults.speak_timeout.as_secs(),
            scoring: defaults.scoring,
        }
    }
}

impl FileSchedulerConfig {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_round_limit(self.round_limit)
            .with_speak_timeout(Duration::from_secs(self.speak_timeout_secs))
            .with_scoring(self.scoring.clone())
    }
}
