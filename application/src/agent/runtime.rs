//! Agent Turn Protocol
//!
//! An [`AgentRuntime`] listens to its discussion's event bus, decides
//! whether each posted message warrants a reply, bids for the floor, and
//! produces the reply once granted.
//!
//! # Turn lifecycle
//!
//! ```text
//! MessagePosted ─▶ evaluate ─▶ submit SpeakRequest ─▶ (granted) speak
//!                                                        │
//!        ┌───────────────────────────────────────────────┘
//!        ▼
//!   thinking=true ─▶ build context ─▶ generate (whole or streamed)
//!        │
//!        ├─ reply      ─▶ MessagePosted, Turn::complete
//!        ├─ cancelled  ─▶ "[interrupted]" appended, MessagePosted, Turn::complete
//!        └─ failure    ─▶ message marked error, TurnFailed, Turn dropped
//! ```
//!
//! A dropped turn frees the floor without counting a round, so failed
//! generations and storage errors never spend the discussion's budget.

use crate::bus::{Topic, recv_lossy};
use crate::clock;
use crate::config::AgentBehavior;
use crate::ports::generation::{GenerationBackend, GenerationError, StreamHandle};
use crate::ports::storage::DiscussionRepository;
use crate::scheduler::{SpeakRequest, SpeakScheduler, Turn, TurnError};
use roundtable_domain::{
    AgentId, AgentProfile, AgentRuntimeState, Author, DiscussionEvent, DiscussionId,
    DiscussionState, DomainError, Eligibility, GenerationContext, MentionMatcher, Message,
    MessageStatus, NewMessage, ReasonFactors, SchedulerEvent, SpeakReason, StreamEvent, TurnPhase,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Collaborators shared by every agent of one discussion
#[derive(Clone)]
pub struct AgentEnvironment {
    pub discussion_id: DiscussionId,
    pub scheduler: SpeakScheduler,
    pub events: Arc<Topic<DiscussionEvent>>,
    pub repository: Arc<dyn DiscussionRepository>,
    pub backend: Arc<dyn GenerationBackend>,
    /// Live view of the discussion (settings, topic, members)
    pub state: watch::Receiver<DiscussionState>,
    pub behavior: AgentBehavior,
}

/// How a granted turn ended without an error
#[derive(Debug)]
enum TurnOutcome {
    Replied(Message),
    /// Cut short; streamed output so far, if any
    Interrupted(Option<Message>),
}

struct AgentCore {
    id: AgentId,
    profile: Mutex<AgentProfile>,
    matcher: MentionMatcher,
    state: Mutex<AgentRuntimeState>,
    env: AgentEnvironment,
}

/// One participant's runtime
pub struct AgentRuntime {
    core: Arc<AgentCore>,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRuntime {
    pub fn new(
        profile: AgentProfile,
        auto_reply: bool,
        env: AgentEnvironment,
    ) -> Result<Self, DomainError> {
        profile.validate()?;
        let matcher = MentionMatcher::new(&profile.name)?;
        let mut state = AgentRuntimeState::new(auto_reply);
        state.respond_to_self = env.behavior.respond_to_self;

        Ok(Self {
            core: Arc::new(AgentCore {
                id: profile.id.clone(),
                profile: Mutex::new(profile),
                matcher,
                state: Mutex::new(state),
                env,
            }),
            shutdown: CancellationToken::new(),
            listener: Mutex::new(None),
        })
    }

    /// Start listening to the discussion. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut listener = lock(&self.listener);
        if listener.is_some() {
            return;
        }
        // subscribe before spawning so nothing published meanwhile is missed
        let events = self.core.env.events.subscribe();
        let notices = self.core.env.scheduler.subscribe();
        let core = Arc::clone(&self.core);
        let shutdown = self.shutdown.clone();
        *listener = Some(tokio::spawn(listen(core, events, notices, shutdown)));
        debug!(agent_id = %self.core.id, "Agent listening");
    }

    /// Stop listening. An in-flight turn finishes on its own.
    pub fn stop(&self) {
        self.shutdown.cancel();
        if let Some(handle) = lock(&self.listener).take() {
            handle.abort();
        }
    }

    pub fn id(&self) -> &AgentId {
        &self.core.id
    }

    pub fn profile(&self) -> AgentProfile {
        self.core.profile()
    }

    pub fn state(&self) -> AgentRuntimeState {
        self.core.lock_state().clone()
    }

    pub fn is_thinking(&self) -> bool {
        self.core.lock_state().is_thinking
    }

    /// Not paused and not generating
    pub fn is_ready(&self) -> bool {
        self.core.lock_state().is_ready()
    }

    pub fn pause(&self) {
        self.core.lock_state().pause();
    }

    pub fn resume(&self) {
        self.core.lock_state().resume();
    }

    pub fn set_auto_reply(&self, enabled: bool) {
        self.core.lock_state().auto_reply = enabled;
    }

    pub fn set_concise_mode(&self, enabled: bool) {
        self.core.lock_profile().concise_mode = enabled;
    }

    /// Evaluate a posted message and bid for the floor if warranted.
    pub fn on_message(&self, message: &Message) {
        self.core.on_message(message);
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn listen(
    core: Arc<AgentCore>,
    mut events: broadcast::Receiver<DiscussionEvent>,
    mut notices: broadcast::Receiver<SchedulerEvent>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = recv_lossy(&mut events, "agent") => match event {
                Some(DiscussionEvent::MessagePosted { message }) => core.on_message(&message),
                Some(_) => {}
                None => break,
            },
            notice = recv_lossy(&mut notices, "agent") => match notice {
                Some(SchedulerEvent::SpeakTimeout { agent_id }) if agent_id == core.id => {
                    warn!(%agent_id, "Speaking timed out");
                }
                Some(SchedulerEvent::SpeakInterrupted { agent_id }) if agent_id == core.id => {
                    info!(%agent_id, "Speaking interrupted");
                }
                Some(_) => {}
                None => break,
            },
        }
    }
    debug!(agent_id = %core.id, "Agent listener stopped");
}

impl AgentCore {
    fn lock_state(&self) -> MutexGuard<'_, AgentRuntimeState> {
        lock(&self.state)
    }

    fn lock_profile(&self) -> MutexGuard<'_, AgentProfile> {
        lock(&self.profile)
    }

    fn profile(&self) -> AgentProfile {
        self.lock_profile().clone()
    }

    fn publish(&self, event: DiscussionEvent) {
        self.env.events.publish(event);
    }

    fn set_thinking(&self, thinking: bool) {
        self.lock_state().is_thinking = thinking;
        self.publish(DiscussionEvent::Thinking {
            agent_id: self.id.clone(),
            is_thinking: thinking,
        });
    }

    // ==================== Evaluation ====================

    fn on_message(self: &Arc<Self>, message: &Message) {
        if message.discussion_id != self.env.discussion_id
            || message.status != MessageStatus::Completed
        {
            return;
        }

        let profile = self.profile();
        let mentioned = self.matcher.is_mentioned(&message.content);
        let own_message = message.is_from(&self.id);
        let now = clock::now();
        let min_delay = self
            .env
            .behavior
            .effective_delay(self.env.state.borrow().settings().min_response_delay());

        let from_agent = matches!(message.author, Author::Agent(_));

        let (eligibility, silence) = {
            let mut state = self.lock_state();
            // a user or system answer to this agent's last reply earns a follow-up
            let eligibility = if !mentioned
                && !from_agent
                && state.answers_last_reply(message.origin_message_id.as_ref())
            {
                state.evaluate_follow_up()
            } else {
                state.evaluate(mentioned, own_message, now, min_delay)
            };
            if eligibility.is_eligible() {
                let moved = state
                    .transition(TurnPhase::Evaluating)
                    .and_then(|_| state.transition(TurnPhase::Requesting));
                if let Err(e) = moved {
                    debug!(agent_id = %self.id, error = %e, "Cannot request the floor");
                    return;
                }
            }
            (eligibility, state.silence(now))
        };

        let reason = match eligibility {
            Eligibility::Mentioned => SpeakReason::mentioned(),
            Eligibility::FollowUp => SpeakReason::follow_up(),
            Eligibility::AutoReply => SpeakReason::auto_reply(),
            Eligibility::Ineligible(why) => {
                debug!(agent_id = %self.id, message_id = %message.id, ?why, "Not responding");
                return;
            }
        };
        let reason = reason.with_factors(ReasonFactors {
            is_moderator: profile.is_moderator(),
            context_relevance: None,
            // never spoke: maximal silence
            time_since_last_spoke: Some(silence.unwrap_or(Duration::MAX)),
        });

        debug!(
            agent_id = %self.id,
            message_id = %message.id,
            reason = %reason.kind,
            "Requesting the floor"
        );
        let core = Arc::clone(self);
        let trigger = message.clone();
        let request = SpeakRequest::new(self.id.clone(), profile.name, reason, move |turn| {
            core.speak(turn, trigger)
        })
        .with_trigger(message.id.clone());
        self.env.scheduler.submit(request);
    }

    // ==================== Speaking ====================

    async fn speak(self: Arc<Self>, turn: Turn, trigger: Message) -> Result<(), TurnError> {
        let entered = self.lock_state().transition(TurnPhase::Speaking);
        if let Err(e) = entered {
            // paused between request and grant; dropping the turn frees the floor
            debug!(agent_id = %self.id, error = %e, "Declining granted turn");
            return Ok(());
        }
        self.set_thinking(true);

        let outcome = self.produce(&turn, &trigger).await;

        {
            let mut state = self.lock_state();
            if state.phase() == TurnPhase::Speaking {
                // Speaking -> Idle is always allowed
                let _ = state.transition(TurnPhase::Idle);
            }
            if let Ok(TurnOutcome::Replied(message) | TurnOutcome::Interrupted(Some(message))) =
                &outcome
            {
                state.last_spoke_at = Some(clock::now());
                state.last_reply = Some(message.id.clone());
            }
        }
        self.set_thinking(false);

        match outcome {
            Ok(TurnOutcome::Replied(message)) => {
                info!(
                    agent_id = %self.id,
                    message_id = %message.id,
                    turn = %turn.id,
                    "Reply posted"
                );
                self.publish(DiscussionEvent::MessagePosted { message });
                turn.complete();
                Ok(())
            }
            Ok(TurnOutcome::Interrupted(message)) => {
                info!(agent_id = %self.id, turn = %turn.id, "Reply interrupted");
                if let Some(message) = message {
                    self.publish(DiscussionEvent::MessagePosted { message });
                }
                turn.complete();
                Ok(())
            }
            Err(error) => {
                warn!(agent_id = %self.id, turn = %turn.id, %error, "Failed to speak");
                self.publish(DiscussionEvent::TurnFailed {
                    discussion_id: self.env.discussion_id.clone(),
                    agent_id: self.id.clone(),
                    trigger_message_id: Some(trigger.id.clone()),
                    error: error.to_string(),
                });
                drop(turn);
                Err(error)
            }
        }
    }

    async fn produce(&self, turn: &Turn, trigger: &Message) -> Result<TurnOutcome, TurnError> {
        let context = self.build_context(trigger).await?;
        if turn.is_cancelled() {
            return Ok(TurnOutcome::Interrupted(None));
        }
        if self.env.behavior.streaming {
            self.stream_reply(turn, &context).await
        } else {
            self.standard_reply(turn, &context).await
        }
    }

    async fn build_context(&self, trigger: &Message) -> Result<GenerationContext, TurnError> {
        let (mut settings, topic, member_ids) = {
            let state = self.env.state.borrow();
            let ids: Vec<AgentId> = state.members().iter().map(|m| m.agent_id.clone()).collect();
            (state.settings().clone(), state.topic().to_string(), ids)
        };
        let agent = self.profile();
        let catalogue = self.env.repository.list_agents().await?;
        let members = member_ids
            .iter()
            .filter_map(|id| {
                if id == &agent.id {
                    Some(agent.clone())
                } else {
                    catalogue.iter().find(|p| &p.id == id).cloned()
                }
            })
            .collect();
        let history = self
            .env
            .repository
            .list_messages(&self.env.discussion_id)
            .await?;
        settings.concise_mode = settings.concise_mode || agent.concise_mode;

        Ok(GenerationContext {
            discussion_id: self.env.discussion_id.clone(),
            agent,
            members,
            settings,
            topic,
            history,
            trigger: trigger.clone(),
        })
    }

    async fn standard_reply(
        &self,
        turn: &Turn,
        context: &GenerationContext,
    ) -> Result<TurnOutcome, TurnError> {
        let text = tokio::select! {
            biased;
            _ = turn.cancelled() => return Ok(TurnOutcome::Interrupted(None)),
            result = self.env.backend.generate(context) => result?,
        };
        let message = self
            .env
            .repository
            .create_message(
                NewMessage::new(context.discussion_id.clone(), Author::Agent(self.id.clone()), text)
                    .in_reply_to(context.trigger.id.clone()),
            )
            .await?;
        Ok(TurnOutcome::Replied(message))
    }

    async fn stream_reply(
        &self,
        turn: &Turn,
        context: &GenerationContext,
    ) -> Result<TurnOutcome, TurnError> {
        // placeholder first, so observers see the reply before any chunk
        let mut message = self
            .env
            .repository
            .create_message(
                NewMessage::new(context.discussion_id.clone(), Author::Agent(self.id.clone()), "")
                    .with_status(MessageStatus::Streaming)
                    .in_reply_to(context.trigger.id.clone()),
            )
            .await?;
        self.publish(DiscussionEvent::MessageUpdated {
            message: message.clone(),
        });

        let stream = tokio::select! {
            biased;
            _ = turn.cancelled() => None,
            result = self.env.backend.stream_generate(context) => Some(result),
        };
        let mut handle: StreamHandle = match stream {
            None => return self.finish_interrupted(message).await,
            Some(Ok(handle)) => handle,
            Some(Err(error)) => return Err(self.finish_failed(message, error).await),
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = turn.cancelled() => return self.finish_interrupted(message).await,
                event = handle.receiver.recv() => event,
            };
            match event {
                Some(StreamEvent::Delta(chunk)) => {
                    message.append_chunk(&chunk);
                    self.save(&message).await?;
                }
                Some(StreamEvent::Completed(text)) => {
                    if message.content.is_empty() {
                        message.content = text;
                    }
                    message.complete();
                    self.save(&message).await?;
                    return Ok(TurnOutcome::Replied(message));
                }
                Some(StreamEvent::Error(e)) => {
                    return Err(self.finish_failed(message, GenerationError::Stream(e)).await);
                }
                None => {
                    message.complete();
                    self.save(&message).await?;
                    return Ok(TurnOutcome::Replied(message));
                }
            }
        }
    }

    async fn save(&self, message: &Message) -> Result<(), TurnError> {
        self.env.repository.update_message(message).await?;
        self.publish(DiscussionEvent::MessageUpdated {
            message: message.clone(),
        });
        Ok(())
    }

    async fn finish_interrupted(&self, mut message: Message) -> Result<TurnOutcome, TurnError> {
        message.complete_interrupted();
        self.save(&message).await?;
        Ok(TurnOutcome::Interrupted(Some(message)))
    }

    async fn finish_failed(&self, mut message: Message, error: GenerationError) -> TurnError {
        message.fail();
        if let Err(e) = self.save(&message).await {
            warn!(
                agent_id = %self.id,
                message_id = %message.id,
                error = %e,
                "Could not mark reply as failed"
            );
        }
        TurnError::Generation(error)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
