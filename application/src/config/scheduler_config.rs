//! Speak scheduler parameters.

use roundtable_domain::ScoringWeights;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round budget, per-turn timeout and scoring policy of a
/// [`SpeakScheduler`](crate::scheduler::SpeakScheduler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Completed turns allowed before the scheduler reports the limit
    pub round_limit: u32,
    /// How long a speaker may hold the floor
    pub speak_timeout: Duration,
    pub scoring: ScoringWeights,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            round_limit: 20,
            speak_timeout: Duration::from_secs(30),
            scoring: ScoringWeights::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_round_limit(mut self, limit: u32) -> Self {
        self.round_limit = limit;
        self
    }

    pub fn with_speak_timeout(mut self, timeout: Duration) -> Self {
        self.speak_timeout = timeout;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringWeights) -> Self {
        self.scoring = scoring;
        self
    }
}
