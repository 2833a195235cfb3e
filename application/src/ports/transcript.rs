//! Port for structured transcript logging.
//!
//! [`TranscriptLogger`] records discussion and scheduler events to a
//! machine-readable log (JSONL). This is separate from `tracing`, which
//! carries human-readable diagnostics.

use roundtable_domain::{DiscussionEvent, SchedulerEvent};
use serde_json::Value;

/// A structured transcript record: a type string and a JSON payload.
pub struct TranscriptEvent {
    /// Event type identifier (e.g., "message_posted", "granted").
    pub event_type: &'static str,
    pub payload: Value,
}

impl TranscriptEvent {
    pub fn new(event_type: &'static str, payload: Value) -> Self {
        Self {
            event_type,
            payload,
        }
    }

    pub fn from_discussion(event: &DiscussionEvent) -> Self {
        Self::new(
            event.event_type(),
            serde_json::to_value(event).unwrap_or(Value::Null),
        )
    }

    pub fn from_scheduler(event: &SchedulerEvent) -> Self {
        Self::new(
            event.event_type(),
            serde_json::to_value(event).unwrap_or(Value::Null),
        )
    }
}

/// Port for logging transcript events.
///
/// `log` is synchronous and infallible; implementations swallow their own
/// write failures.
pub trait TranscriptLogger: Send + Sync {
    fn log(&self, event: TranscriptEvent);
}

/// No-op implementation for tests and when transcripts are disabled.
pub struct NoTranscript;

impl TranscriptLogger for NoTranscript {
    fn log(&self, _event: TranscriptEvent) {}
}
