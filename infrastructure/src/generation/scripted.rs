//! Deterministic offline generation backend.
//!
//! Composes a reply from the speaking persona and the triggering message,
//! so a discussion can be exercised end to end without a language model.
//! Streaming emits the reply word by word.

use async_trait::async_trait;
use roundtable_application::{GenerationBackend, GenerationError, StreamHandle};
use roundtable_domain::{AgentRole, GenerationContext, StreamEvent, truncate};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const EXCERPT_LEN: usize = 60;

const MODERATOR_LINES: &[&str] = &[
    "let's pin down what we actually agree on before going further.",
    "that is a useful angle; I'd like to hear the counterargument.",
    "we are circling. What would change anyone's mind here?",
    "good point. Let's make sure we are not skipping the hard part.",
];

const PARTICIPANT_LINES: &[&str] = &[
    "I'd start with the simplest version and measure before adding anything.",
    "I'm not convinced; the failure cases deserve more attention.",
    "that holds in the common case, but the edge cases are where it breaks.",
    "agreed in principle, though the cost of getting it wrong is high.",
    "we could try it on a small scale first and see what we learn.",
];

/// Backend that writes replies from canned lines
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    chunk_delay: Duration,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_millis(40),
        }
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause before every streamed word
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// The reply `context.agent` gives to `context.trigger`
    pub fn compose(context: &GenerationContext) -> String {
        let agent = &context.agent;
        let previous_turns = context
            .history
            .iter()
            .filter(|m| m.is_from(&agent.id))
            .count();
        let seed = agent.id.as_str().bytes().map(usize::from).sum::<usize>() + previous_turns;

        let lines = match agent.role {
            AgentRole::Moderator => MODERATOR_LINES,
            AgentRole::Participant => PARTICIPANT_LINES,
        };
        let speaker = context.author_name(&context.trigger.author);
        let mut reply = format!(
            "{speaker}, on \"{}\": {}",
            context.trigger_excerpt(EXCERPT_LEN),
            lines[seed % lines.len()]
        );

        if let Some(expertise) = agent.expertise.first() {
            reply.push_str(&format!(" Speaking from {expertise}"));
            if !context.topic.is_empty() {
                reply.push_str(&format!(", this matters for {}", context.topic));
            }
            reply.push('.');
        }

        // the moderator hands the floor to someone
        let peers = context.peer_names();
        if agent.role == AgentRole::Moderator && !peers.is_empty() {
            reply.push_str(&format!(" @{}, your view?", peers[previous_turns % peers.len()]));
        }

        match context.length_limit() {
            Some(limit) => truncate(&reply, limit),
            None => reply,
        }
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError> {
        Ok(Self::compose(context))
    }

    async fn stream_generate(
        &self,
        context: &GenerationContext,
    ) -> Result<StreamHandle, GenerationError> {
        let reply = Self::compose(context);
        let delay = self.chunk_delay;
        let agent_id = context.agent.id.clone();
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            for word in reply.split_inclusive(' ') {
                tokio::time::sleep(delay).await;
                if tx.send(StreamEvent::Delta(word.to_string())).await.is_err() {
                    debug!(%agent_id, "Stream dropped by the consumer");
                    return;
                }
            }
            let _ = tx.send(StreamEvent::Completed(reply)).await;
        });
        Ok(StreamHandle::new(rx))
    }
}
