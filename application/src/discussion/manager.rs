//! Discussion Lifecycle Manager
//!
//! Owns the state of the active discussion, its agent set and the speak
//! scheduler, and drives them through
//!
//! ```text
//! Uninitialized ─switch─▶ Paused ⇄ Running ─switch─▶ Paused (next discussion)
//! ```
//!
//! Background listeners hold a [`Weak`] handle to the manager and are
//! registered in the [`CleanupTiers`] of their lifetime, so a teardown
//! aborts exactly the work that belongs to it.

use super::cleanup::CleanupTiers;
use super::error::{DiscussionError, ErrorContext};
use crate::agent::{AgentEnvironment, AgentRegistry, AgentRuntime, SyncReport};
use crate::bus::{StateStore, Topic, recv_lossy};
use crate::config::RoundtableConfig;
use crate::ports::generation::GenerationBackend;
use crate::ports::storage::{DiscussionRepository, StorageError};
use crate::ports::transcript::{TranscriptEvent, TranscriptLogger};
use crate::scheduler::SpeakScheduler;
use chrono::Utc;
use roundtable_domain::{
    AgentId, Discussion, DiscussionEvent, DiscussionId, DiscussionSettings, DiscussionState,
    Member, Message, MessageId, NewMessage, SchedulerEvent,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn storage_error(id: &DiscussionId) -> impl FnOnce(StorageError) -> DiscussionError + use<> {
    let context = ErrorContext::discussion(id.clone());
    move |e| DiscussionError::storage(e, context)
}

/// Builder for [`DiscussionManager`]
pub struct DiscussionManagerBuilder {
    repository: Arc<dyn DiscussionRepository>,
    backend: Arc<dyn GenerationBackend>,
    config: RoundtableConfig,
    transcript: Option<Arc<dyn TranscriptLogger>>,
}

impl DiscussionManagerBuilder {
    pub fn config(mut self, config: RoundtableConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every discussion and scheduler event
    pub fn transcript(mut self, logger: Arc<dyn TranscriptLogger>) -> Self {
        self.transcript = Some(logger);
        self
    }

    /// Must be called inside a Tokio runtime.
    pub fn build(self) -> Arc<DiscussionManager> {
        let scheduler = SpeakScheduler::new(self.config.scheduler.clone());
        let manager = Arc::new_cyclic(|this| DiscussionManager {
            this: this.clone(),
            repository: self.repository,
            backend: self.backend,
            scheduler,
            events: Arc::new(Topic::new()),
            errors: Topic::new(),
            state: StateStore::new(DiscussionState::new()),
            agents: Mutex::new(None),
            indicators: Mutex::new(BTreeSet::new()),
            cleanup: CleanupTiers::default(),
            transitions: tokio::sync::Mutex::new(()),
            config: self.config,
        });
        // nothing may be granted before a discussion runs
        manager.scheduler.set_paused(true);
        if let Some(logger) = self.transcript {
            manager.install_transcript(logger);
        }
        manager
    }
}

/// Lifecycle owner of the active discussion
pub struct DiscussionManager {
    this: Weak<DiscussionManager>,
    config: RoundtableConfig,
    repository: Arc<dyn DiscussionRepository>,
    backend: Arc<dyn GenerationBackend>,
    scheduler: SpeakScheduler,
    events: Arc<Topic<DiscussionEvent>>,
    errors: Topic<DiscussionError>,
    state: StateStore<DiscussionState>,
    agents: Mutex<Option<Arc<AgentRegistry>>>,
    /// Agents currently generating
    indicators: Mutex<BTreeSet<AgentId>>,
    cleanup: CleanupTiers,
    /// Serializes run, switch, membership changes and destroy
    transitions: tokio::sync::Mutex<()>,
}

impl DiscussionManager {
    pub fn builder(
        repository: Arc<dyn DiscussionRepository>,
        backend: Arc<dyn GenerationBackend>,
    ) -> DiscussionManagerBuilder {
        DiscussionManagerBuilder {
            repository,
            backend,
            config: RoundtableConfig::default(),
            transcript: None,
        }
    }

    // ==================== Queries ====================

    pub fn current_discussion_id(&self) -> Option<DiscussionId> {
        self.state.read(|s| s.discussion_id().cloned())
    }

    pub fn is_paused(&self) -> bool {
        self.state.read(|s| s.is_paused())
    }

    pub fn state(&self) -> DiscussionState {
        self.state.snapshot()
    }

    pub fn watch_state(&self) -> watch::Receiver<DiscussionState> {
        self.state.watch()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscussionEvent> {
        self.events.subscribe()
    }

    pub fn scheduler_events(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.scheduler.subscribe()
    }

    pub fn errors(&self) -> broadcast::Receiver<DiscussionError> {
        self.errors.subscribe()
    }

    pub fn scheduler(&self) -> &SpeakScheduler {
        &self.scheduler
    }

    /// Thinking indicators, in id order
    pub fn indicators(&self) -> Vec<AgentId> {
        lock(&self.indicators).iter().cloned().collect()
    }

    pub fn agent(&self, id: &AgentId) -> Option<Arc<AgentRuntime>> {
        self.registry().and_then(|agents| agents.get(id))
    }

    fn registry(&self) -> Option<Arc<AgentRegistry>> {
        lock(&self.agents).clone()
    }

    fn require_discussion(&self) -> Result<DiscussionId, DiscussionError> {
        self.current_discussion_id()
            .ok_or_else(|| DiscussionError::NoDiscussion {
                context: ErrorContext::default(),
            })
    }

    // ==================== Lifecycle ====================

    /// Start or continue the active discussion.
    ///
    /// Does nothing while already running. Otherwise resumes the agents and
    /// the scheduler, waits for every agent to be ready, then replays the
    /// latest message so the conversation picks up where it stopped.
    pub async fn run(&self) -> Result<(), DiscussionError> {
        let _transition = self.transitions.lock().await;
        if !self.is_paused() {
            debug!("Discussion already running");
            return Ok(());
        }

        match self.resume_existing().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.report(e.clone());
                if !self.is_paused() {
                    self.pause();
                }
                Err(e)
            }
        }
    }

    async fn resume_existing(&self) -> Result<(), DiscussionError> {
        let id = self.require_discussion()?;
        let context = ErrorContext::discussion(id.clone());
        let (has_members, has_history, replay) = self.state.read(|s| {
            (
                !s.members().is_empty(),
                s.has_history(),
                s.messages().iter().rev().find(|m| m.is_replayable()).cloned(),
            )
        });
        if !has_members {
            return Err(DiscussionError::NoParticipants { context });
        }
        if !has_history {
            return Err(DiscussionError::NoHistory { context });
        }

        info!(discussion_id = %id, "Resuming discussion");
        self.resume();
        self.wait_until_ready().await;

        if let Some(message) = replay {
            let manager = self.this.clone();
            self.cleanup
                .timers
                .schedule(self.config.lifecycle.settle_delay, async move {
                    if let Some(manager) = manager.upgrade() {
                        debug!(message_id = %message.id, "Replaying last message");
                        manager.events.publish(DiscussionEvent::MessagePosted { message });
                    }
                });
        }
        Ok(())
    }

    async fn wait_until_ready(&self) {
        let lifecycle = &self.config.lifecycle;
        let mut paused = self.scheduler.paused();
        let ready = async {
            let _ = paused.wait_for(|paused| !*paused).await;
            while !self.registry().is_none_or(|agents| agents.all_ready()) {
                tokio::time::sleep(lifecycle.ready_poll_interval).await;
            }
        };
        if tokio::time::timeout(lifecycle.ready_timeout, ready)
            .await
            .is_err()
        {
            warn!(timeout = ?lifecycle.ready_timeout, "Agents not ready in time; resuming anyway");
        }
    }

    pub fn pause(&self) {
        self.state.update(|s| s.set_paused(true));
        if let Some(agents) = self.registry() {
            agents.pause_all();
        }
        self.scheduler.set_paused(true);
        self.events.publish(DiscussionEvent::Paused);
        self.cleanup.cleanup_runtime();
        self.scheduler.reset_counter();
        self.reset_round();
        info!(discussion_id = ?self.current_discussion_id(), "Discussion paused");
    }

    pub fn resume(&self) {
        self.state.update(|s| s.set_paused(false));
        self.scheduler.set_paused(false);
        self.scheduler.reset_counter();
        self.reset_round();
        if let Some(agents) = self.registry() {
            agents.resume_all();
        }
        self.events.publish(DiscussionEvent::Resumed);
        info!(discussion_id = ?self.current_discussion_id(), "Discussion resumed");
    }

    fn reset_round(&self) {
        if let Err(e) = self.state.try_update(|s| s.set_round(0)) {
            warn!(error = %e, "Failed to reset the round counter");
        }
    }

    /// Interrupt `agent_id` if it holds the floor.
    pub fn interrupt(&self, agent_id: &AgentId) -> bool {
        self.scheduler.interrupt(agent_id)
    }

    /// Make `id` the active discussion (`None` leaves no discussion active).
    ///
    /// The previous discussion is fully torn down before the new one is
    /// loaded. The new discussion starts paused.
    pub async fn switch_discussion(&self, id: Option<DiscussionId>) -> Result<(), DiscussionError> {
        let _transition = self.transitions.lock().await;
        if self.current_discussion_id() == id {
            return Ok(());
        }

        self.teardown_discussion();
        self.state.update(|s| s.set_discussion_id(id.clone()));
        let Some(id) = id else {
            info!("No discussion active");
            return Ok(());
        };

        if let Err(e) = self.load(&id).await {
            self.state.update(|s| s.set_discussion_id(None));
            self.report(e.clone());
            return Err(e);
        }
        Ok(())
    }

    fn teardown_discussion(&self) {
        self.pause();
        lock(&self.indicators).clear();
        self.scheduler.clear();
        if let Some(agents) = self.registry() {
            agents.pause_all();
        }
        self.state.update(|s| {
            s.reset_discussion_state();
            s.set_messages(Vec::new());
            s.set_topic("");
        });
        if let Err(e) = self.state.try_update(|s| s.set_members(Vec::new())) {
            warn!(error = %e, "Failed to clear members");
        }
        self.cleanup.cleanup_discussion();
        lock(&self.agents).take();
    }

    async fn load(&self, id: &DiscussionId) -> Result<(), DiscussionError> {
        let discussion = self
            .repository
            .get_discussion(id)
            .await
            .map_err(storage_error(id))?
            .ok_or_else(|| DiscussionError::NoDiscussion {
                context: ErrorContext::discussion(id.clone()),
            })?;
        let members = self
            .repository
            .list_members(id)
            .await
            .map_err(storage_error(id))?;
        let messages = self
            .repository
            .list_messages(id)
            .await
            .map_err(storage_error(id))?;
        let profiles = self
            .repository
            .list_agents()
            .await
            .map_err(storage_error(id))?;

        let message_count = messages.len();
        self.state
            .try_update(|s| {
                s.set_topic(discussion.topic.clone());
                s.set_settings(discussion.settings.clone());
                s.set_members(members.clone())?;
                s.set_messages(messages);
                Ok(())
            })
            .map_err(|e| DiscussionError::invalid(e, ErrorContext::discussion(id.clone())))?;
        self.scheduler
            .set_round_limit(discussion.settings.round_limit);

        let agents = Arc::new(AgentRegistry::new(AgentEnvironment {
            discussion_id: id.clone(),
            scheduler: self.scheduler.clone(),
            events: Arc::clone(&self.events),
            repository: Arc::clone(&self.repository),
            backend: Arc::clone(&self.backend),
            state: self.state.watch(),
            behavior: self.config.agents.clone(),
        }));
        agents.sync(&members, &profiles);
        agents.pause_all();
        *lock(&self.agents) = Some(Arc::clone(&agents));
        self.cleanup.discussion.add(move || agents.cleanup());

        self.install_discussion_listeners(id);
        info!(
            discussion_id = %id,
            members = members.len(),
            messages = message_count,
            "Discussion loaded"
        );
        Ok(())
    }

    /// Tear everything down: agents, scheduler, listeners and state.
    pub async fn destroy(&self) {
        let _transition = self.transitions.lock().await;
        if let Some(agents) = lock(&self.agents).take() {
            agents.cleanup();
        }
        self.scheduler.clear();
        self.scheduler.set_paused(true);
        self.cleanup.cleanup_service();
        lock(&self.indicators).clear();
        self.state.update(|s| s.reset_all());
        info!("Discussion manager destroyed");
    }

    // ==================== Discussion contents ====================

    /// Replace the member list and reconcile the agent set with it.
    pub async fn set_members(&self, members: Vec<Member>) -> Result<SyncReport, DiscussionError> {
        let _transition = self.transitions.lock().await;
        self.apply_members(members).await
    }

    async fn apply_members(&self, members: Vec<Member>) -> Result<SyncReport, DiscussionError> {
        let id = self.require_discussion()?;
        self.state
            .try_update(|s| s.set_members(members.clone()))
            .map_err(|e| DiscussionError::invalid(e, ErrorContext::discussion(id.clone())))?;
        self.repository
            .update_members(&id, &members)
            .await
            .map_err(storage_error(&id))?;

        let Some(agents) = self.registry() else {
            return Ok(SyncReport::default());
        };
        let profiles = self
            .repository
            .list_agents()
            .await
            .map_err(storage_error(&id))?;
        let report = agents.sync(&members, &profiles);
        if self.is_paused() {
            agents.pause_all();
        }
        Ok(report)
    }

    /// Toggle a member's auto-reply flag. Returns false for non-members.
    pub async fn set_agent_auto_reply(
        &self,
        agent_id: &AgentId,
        enabled: bool,
    ) -> Result<bool, DiscussionError> {
        let _transition = self.transitions.lock().await;
        let mut members = self.state.read(|s| s.members().to_vec());
        let Some(member) = members.iter_mut().find(|m| &m.agent_id == agent_id) else {
            return Ok(false);
        };
        member.auto_reply = enabled;
        self.apply_members(members).await?;
        Ok(true)
    }

    pub fn update_agent_concise_mode(&self, agent_id: &AgentId, enabled: bool) -> bool {
        match self.agent(agent_id) {
            Some(agent) => {
                agent.set_concise_mode(enabled);
                true
            }
            None => false,
        }
    }

    /// Merge a settings change into the active discussion and persist it.
    pub async fn set_settings(
        &self,
        change: impl FnOnce(&mut DiscussionSettings) + Send,
    ) -> Result<DiscussionSettings, DiscussionError> {
        let id = self.require_discussion()?;
        let mut settings = self.state.read(|s| s.settings().clone());
        change(&mut settings);
        settings
            .validate()
            .map_err(|e| DiscussionError::invalid(e, ErrorContext::discussion(id.clone())))?;

        let persisted = settings.clone();
        self.persist_discussion(&id, move |d| d.settings = persisted)
            .await?;
        self.scheduler.set_round_limit(settings.round_limit);
        self.state.update(|s| s.set_settings(settings.clone()));
        Ok(settings)
    }

    pub async fn set_topic(&self, topic: impl Into<String>) -> Result<(), DiscussionError> {
        let id = self.require_discussion()?;
        let topic = topic.into();
        let persisted = topic.clone();
        self.persist_discussion(&id, move |d| d.topic = persisted)
            .await?;
        self.state.update(|s| s.set_topic(topic));
        Ok(())
    }

    async fn persist_discussion(
        &self,
        id: &DiscussionId,
        change: impl FnOnce(&mut Discussion) + Send,
    ) -> Result<(), DiscussionError> {
        let mut discussion = self
            .repository
            .get_discussion(id)
            .await
            .map_err(storage_error(id))?
            .ok_or_else(|| DiscussionError::NoDiscussion {
                context: ErrorContext::discussion(id.clone()),
            })?;
        change(&mut discussion);
        discussion.updated_at = Utc::now();
        self.repository
            .update_discussion(&discussion)
            .await
            .map_err(storage_error(id))
    }

    /// Post a message from the human participant.
    pub async fn post_message(&self, content: impl Into<String>) -> Result<Message, DiscussionError> {
        let id = self.require_discussion()?;
        self.post(NewMessage::user(id, content)).await
    }

    /// Post a user message answering `origin`. If an agent wrote `origin`
    /// it bids for a follow-up turn.
    pub async fn reply_to(
        &self,
        origin: MessageId,
        content: impl Into<String>,
    ) -> Result<Message, DiscussionError> {
        let id = self.require_discussion()?;
        self.post(NewMessage::user(id, content).in_reply_to(origin))
            .await
    }

    async fn post(&self, new: NewMessage) -> Result<Message, DiscussionError> {
        let id = new.discussion_id.clone();
        let message = self
            .repository
            .create_message(new)
            .await
            .map_err(storage_error(&id))?;
        self.state.update(|s| s.upsert_message(message.clone()));
        self.events.publish(DiscussionEvent::MessagePosted {
            message: message.clone(),
        });
        Ok(message)
    }

    // ==================== Listeners ====================

    fn report(&self, error: DiscussionError) {
        warn!(
            kind = error.kind().as_str(),
            context = %error.context(),
            error = %error,
            "Discussion error"
        );
        if error.should_pause() && !self.is_paused() {
            self.pause();
        }
        self.errors.publish(error);
    }

    fn install_transcript(&self, logger: Arc<dyn TranscriptLogger>) {
        let mut events = self.events.subscribe();
        let mut notices = self.scheduler.subscribe();
        let mut errors = self.errors.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let record = tokio::select! {
                    event = recv_lossy(&mut events, "transcript") => match event {
                        Some(event) => TranscriptEvent::from_discussion(&event),
                        None => break,
                    },
                    notice = recv_lossy(&mut notices, "transcript") => match notice {
                        Some(notice) => TranscriptEvent::from_scheduler(&notice),
                        None => break,
                    },
                    error = recv_lossy(&mut errors, "transcript") => match error {
                        Some(error) => TranscriptEvent::new(
                            "discussion_error",
                            json!({
                                "kind": error.kind().as_str(),
                                "error": error.to_string(),
                                "context": error.context().to_string(),
                            }),
                        ),
                        None => break,
                    },
                };
                logger.log(record);
            }
        });
        self.cleanup.service.add_task(task);
    }

    fn install_discussion_listeners(&self, id: &DiscussionId) {
        let events = self.events.subscribe();
        let notices = self.scheduler.subscribe();
        self.cleanup.discussion.add_task(tokio::spawn(follow_events(
            self.this.clone(),
            id.clone(),
            events,
        )));
        self.cleanup.discussion.add_task(tokio::spawn(follow_scheduler(
            self.this.clone(),
            id.clone(),
            notices,
        )));
    }

    fn on_discussion_event(&self, discussion_id: &DiscussionId, event: DiscussionEvent) {
        match event {
            DiscussionEvent::Thinking {
                agent_id,
                is_thinking,
            } => {
                let mut indicators = lock(&self.indicators);
                if is_thinking {
                    indicators.insert(agent_id);
                } else {
                    indicators.remove(&agent_id);
                }
            }
            DiscussionEvent::MessagePosted { message } | DiscussionEvent::MessageUpdated { message }
                if &message.discussion_id == discussion_id =>
            {
                self.state.update(|s| s.upsert_message(message));
            }
            DiscussionEvent::TurnFailed {
                discussion_id: failed_in,
                agent_id,
                trigger_message_id,
                error,
            } if &failed_in == discussion_id => {
                let mut context = ErrorContext::discussion(failed_in).with_agent(agent_id);
                if let Some(message_id) = trigger_message_id {
                    context = context.with_message(message_id);
                }
                self.report(DiscussionError::GenerateResponse {
                    reason: error,
                    context,
                });
            }
            _ => {}
        }
    }

    fn track_speaker(&self, granted: &AgentId) {
        let tracked = self.state.try_update(|s| {
            let index = s
                .members()
                .iter()
                .position(|m| &m.agent_id == granted)
                .map_or(-1, |i| i as isize);
            s.set_current_speaker_index(index)
        });
        if let Err(e) = tracked {
            warn!(agent_id = %granted, error = %e, "Failed to track the speaker");
        }
    }

    fn release_speaker(&self, released: &AgentId) {
        let speaking = self.state.read(|s| {
            s.current_speaker()
                .is_some_and(|m| &m.agent_id == released)
        });
        if speaking && let Err(e) = self.state.try_update(|s| s.set_current_speaker_index(-1)) {
            warn!(agent_id = %released, error = %e, "Failed to clear the speaker");
        }
    }

    async fn on_limit_reached(&self, discussion_id: &DiscussionId, limit: u32) {
        warn!(%discussion_id, limit, "Round limit reached; pausing the discussion");
        let notice = NewMessage::system(
            discussion_id.clone(),
            format!(
                "The discussion reached its limit of {limit} messages and was paused. Resume it to continue."
            ),
        );
        match self.repository.create_message(notice).await {
            Ok(message) => {
                self.state.update(|s| s.upsert_message(message.clone()));
                self.events
                    .publish(DiscussionEvent::MessageUpdated { message });
            }
            Err(e) => warn!(%discussion_id, error = %e, "Failed to record the round limit notice"),
        }
        self.pause();
    }
}

impl Drop for DiscussionManager {
    fn drop(&mut self) {
        self.cleanup.cleanup_service();
    }
}

async fn follow_events(
    manager: Weak<DiscussionManager>,
    discussion_id: DiscussionId,
    mut events: broadcast::Receiver<DiscussionEvent>,
) {
    while let Some(event) = recv_lossy(&mut events, "discussion").await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        manager.on_discussion_event(&discussion_id, event);
    }
}

async fn follow_scheduler(
    manager: Weak<DiscussionManager>,
    discussion_id: DiscussionId,
    mut notices: broadcast::Receiver<SchedulerEvent>,
) {
    while let Some(notice) = recv_lossy(&mut notices, "discussion").await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        match notice {
            SchedulerEvent::Granted { agent_id, .. } => manager.track_speaker(&agent_id),
            SchedulerEvent::Released { agent_id, .. } => manager.release_speaker(&agent_id),
            SchedulerEvent::MessageProcessed { count } => {
                if let Err(e) = manager
                    .state
                    .try_update(|s| s.set_round(i64::from(count)))
                {
                    warn!(error = %e, "Failed to mirror the round counter");
                }
            }
            SchedulerEvent::LimitReached { limit } => {
                manager.on_limit_reached(&discussion_id, limit).await;
            }
            SchedulerEvent::SpeakTimeout { .. } | SchedulerEvent::SpeakInterrupted { .. } => {}
        }
    }
}
