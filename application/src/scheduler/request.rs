//! Speak requests

use super::turn::{Turn, TurnError};
use crate::clock;
use futures::future::BoxFuture;
use roundtable_domain::{AgentId, MessageId, SpeakReason};
use std::future::Future;
use std::time::Instant;

/// Future returned by a grant callback
pub type GrantFuture = BoxFuture<'static, Result<(), TurnError>>;

type GrantHandler = Box<dyn FnOnce(Turn) -> GrantFuture + Send>;

/// An agent's bid for the floor.
///
/// The grant callback runs on its own task once the request wins
/// arbitration. Requests that never win are dropped with their callback.
pub struct SpeakRequest {
    pub agent_id: AgentId,
    pub agent_name: String,
    pub reason: SpeakReason,
    /// Added to the computed score
    pub priority: f64,
    pub created_at: Instant,
    pub trigger_message_id: Option<MessageId>,
    on_grant: GrantHandler,
}

impl SpeakRequest {
    pub fn new<F, Fut>(
        agent_id: AgentId,
        agent_name: impl Into<String>,
        reason: SpeakReason,
        on_grant: F,
    ) -> Self
    where
        F: FnOnce(Turn) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TurnError>> + Send + 'static,
    {
        Self {
            agent_id,
            agent_name: agent_name.into(),
            reason,
            priority: 0.0,
            created_at: clock::now(),
            trigger_message_id: None,
            on_grant: Box::new(move |turn| Box::pin(on_grant(turn))),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_trigger(mut self, message_id: MessageId) -> Self {
        self.trigger_message_id = Some(message_id);
        self
    }

    pub fn with_created_at(mut self, created_at: Instant) -> Self {
        self.created_at = created_at;
        self
    }

    pub(crate) fn grant(self, turn: Turn) -> GrantFuture {
        (self.on_grant)(turn)
    }
}

impl std::fmt::Debug for SpeakRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakRequest")
            .field("agent_id", &self.agent_id)
            .field("agent_name", &self.agent_name)
            .field("reason", &self.reason.kind)
            .field("priority", &self.priority)
            .field("trigger_message_id", &self.trigger_message_id)
            .finish_non_exhaustive()
    }
}
