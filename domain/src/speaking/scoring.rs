//! Request scoring
//!
//! A pending request's score is
//!
//! ```text
//! base(kind) * (moderator ? moderator_boost : 1)
//!     + relevance * relevance_bonus_max
//!     + min(silence_minutes, silence_cap_minutes) * silence_per_minute
//!     + min(waited_seconds * wait_per_second, wait_cap)
//!     + priority
//! ```
//!
//! The moderator boost is multiplicative on the base only.

use super::reason::{SpeakReason, SpeakReasonKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub mentioned: f64,
    pub follow_up: f64,
    pub auto_reply: f64,
    pub other: f64,
    pub moderator_boost: f64,
    pub relevance_bonus_max: f64,
    pub silence_per_minute: f64,
    /// Silence beyond this many minutes earns nothing more
    pub silence_cap_minutes: f64,
    pub wait_per_second: f64,
    pub wait_cap: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            mentioned: 100.0,
            follow_up: 80.0,
            auto_reply: 50.0,
            other: 30.0,
            moderator_boost: 1.5,
            relevance_bonus_max: 20.0,
            silence_per_minute: 10.0,
            silence_cap_minutes: 5.0,
            wait_per_second: 0.1,
            wait_cap: 20.0,
        }
    }
}

impl ScoringWeights {
    pub fn base(&self, kind: SpeakReasonKind) -> f64 {
        match kind {
            SpeakReasonKind::Mentioned => self.mentioned,
            SpeakReasonKind::FollowUp => self.follow_up,
            SpeakReasonKind::AutoReply => self.auto_reply,
            SpeakReasonKind::Other => self.other,
        }
    }

    /// Bonus for how long an agent has been silent, capped at `silence_cap_minutes`
    pub fn silence_bonus(&self, silent_for: Option<Duration>) -> f64 {
        match silent_for {
            Some(d) => {
                (d.as_secs_f64() / 60.0).min(self.silence_cap_minutes) * self.silence_per_minute
            }
            None => 0.0,
        }
    }

    /// Bonus for time spent waiting in the queue
    pub fn wait_bonus(&self, waited: Duration) -> f64 {
        (waited.as_secs_f64() * self.wait_per_second).min(self.wait_cap)
    }

    pub fn score(&self, reason: &SpeakReason, priority: f64, waited: Duration) -> f64 {
        let mut score = self.base(reason.kind);
        if reason.factors.is_moderator {
            score *= self.moderator_boost;
        }
        if let Some(relevance) = reason.factors.context_relevance {
            score += relevance.clamp(0.0, 1.0) * self.relevance_bonus_max;
        }
        score += self.silence_bonus(reason.factors.time_since_last_spoke);
        score += self.wait_bonus(waited);
        score + priority
    }

    /// Returns a list of problems, empty when the weights are usable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let named = [
            ("mentioned", self.mentioned),
            ("follow_up", self.follow_up),
            ("auto_reply", self.auto_reply),
            ("other", self.other),
            ("relevance_bonus_max", self.relevance_bonus_max),
            ("silence_per_minute", self.silence_per_minute),
            ("silence_cap_minutes", self.silence_cap_minutes),
            ("wait_per_second", self.wait_per_second),
            ("wait_cap", self.wait_cap),
        ];
        for (name, value) in named {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("{name} must be a non-negative number (got {value})"));
            }
        }
        if !(self.moderator_boost.is_finite() && self.moderator_boost > 1.0) {
            problems.push(format!(
                "moderator_boost must be greater than 1 (got {})",
                self.moderator_boost
            ));
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaking::reason::ReasonFactors;

    fn reason(kind: SpeakReasonKind, factors: ReasonFactors) -> SpeakReason {
        SpeakReason::new(kind, "test").with_factors(factors)
    }

    #[test]
    fn test_base_ordering() {
        let w = ScoringWeights::default();
        assert!(w.base(SpeakReasonKind::Mentioned) > w.base(SpeakReasonKind::FollowUp));
        assert!(w.base(SpeakReasonKind::FollowUp) > w.base(SpeakReasonKind::AutoReply));
        assert!(w.base(SpeakReasonKind::AutoReply) > w.base(SpeakReasonKind::Other));
    }

    #[test]
    fn test_moderator_boost_is_multiplicative_on_base() {
        let w = ScoringWeights::default();
        let plain = reason(SpeakReasonKind::AutoReply, ReasonFactors::default());
        let boosted = reason(
            SpeakReasonKind::AutoReply,
            ReasonFactors {
                is_moderator: true,
                ..Default::default()
            },
        );
        assert_eq!(w.score(&plain, 0.0, Duration::ZERO), 50.0);
        assert_eq!(w.score(&boosted, 0.0, Duration::ZERO), 75.0);
    }

    #[test]
    fn test_mention_beats_relevant_moderator_auto_reply() {
        let w = ScoringWeights::default();
        let mention = reason(SpeakReasonKind::Mentioned, ReasonFactors::default());
        let moderator = reason(
            SpeakReasonKind::AutoReply,
            ReasonFactors {
                is_moderator: true,
                context_relevance: Some(0.9),
                ..Default::default()
            },
        );
        let m = w.score(&mention, 0.0, Duration::ZERO);
        let o = w.score(&moderator, 0.0, Duration::ZERO);
        assert!(m > o, "mention {m} should outrank moderator {o}");
    }

    #[test]
    fn test_silence_bonus_caps_at_five_minutes() {
        let w = ScoringWeights::default();
        assert_eq!(w.silence_bonus(None), 0.0);
        assert_eq!(w.silence_bonus(Some(Duration::from_secs(60))), 10.0);
        assert_eq!(w.silence_bonus(Some(Duration::from_secs(3600))), 50.0);
        assert_eq!(w.silence_bonus(Some(Duration::MAX)), 50.0);
    }

    #[test]
    fn test_silence_cap_is_tunable() {
        let w = ScoringWeights {
            silence_cap_minutes: 2.0,
            ..Default::default()
        };
        assert_eq!(w.silence_bonus(Some(Duration::from_secs(60))), 10.0);
        assert_eq!(w.silence_bonus(Some(Duration::from_secs(600))), 20.0);

        let off = ScoringWeights {
            silence_cap_minutes: 0.0,
            ..Default::default()
        };
        assert_eq!(off.silence_bonus(Some(Duration::MAX)), 0.0);
    }

    #[test]
    fn test_wait_bonus_caps() {
        let w = ScoringWeights::default();
        assert_eq!(w.wait_bonus(Duration::from_secs(10)), 1.0);
        assert_eq!(w.wait_bonus(Duration::from_secs(10_000)), 20.0);
    }

    #[test]
    fn test_relevance_is_clamped() {
        let w = ScoringWeights::default();
        let r = reason(
            SpeakReasonKind::Other,
            ReasonFactors {
                context_relevance: Some(7.0),
                ..Default::default()
            },
        );
        assert_eq!(w.score(&r, 0.0, Duration::ZERO), 50.0);
    }

    #[test]
    fn test_priority_is_added() {
        let w = ScoringWeights::default();
        let r = reason(SpeakReasonKind::Other, ReasonFactors::default());
        assert_eq!(w.score(&r, 5.0, Duration::ZERO), 35.0);
    }

    #[test]
    fn test_problems() {
        assert!(ScoringWeights::default().problems().is_empty());
        let bad = ScoringWeights {
            moderator_boost: 1.0,
            wait_cap: -1.0,
            ..Default::default()
        };
        assert_eq!(bad.problems().len(), 2);

        let bad_cap = ScoringWeights {
            silence_cap_minutes: f64::NAN,
            ..Default::default()
        };
        assert_eq!(bad_cap.problems().len(), 1);
        assert!(bad_cap.problems()[0].starts_with("silence_cap_minutes"));
    }
}
