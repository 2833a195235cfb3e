//! Speak Scheduler
//!
//! Single arbitration point of a discussion. Requests wait in a queue; when
//! the floor is free and the scheduler is neither paused nor exhausted, the
//! highest-scoring request wins (ties go to the oldest).
//!
//! ```text
//! submit ──▶ queue ──arbitrate──▶ Granted ──▶ grant callback(Turn)
//!                ▲                   │
//!                │                   ├── Turn::complete ──▶ Released + MessageProcessed
//!                │                   ├── Turn dropped / callback Err ──▶ Released
//!                │                   ├── timer fires ──▶ SpeakTimeout + Released
//!                │                   └── pause / clear ──▶ SpeakInterrupted + Released
//!                │                                (timer, pause and clear cancel the turn)
//!                └────── re-arbitrate after every release ─────┘
//! ```
//!
//! All state sits behind one mutex that is never held across an await, so
//! "insert then maybe grant" is atomic with respect to other submissions and
//! completions.

use super::request::SpeakRequest;
use super::turn::{FloorGuard, Turn};
use crate::bus::Topic;
use crate::clock;
use crate::config::SchedulerConfig;
use roundtable_domain::{AgentId, SchedulerEvent, ScoringWeights, TurnId};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Who currently holds the floor
#[derive(Debug)]
struct SpeakingState {
    agent_id: AgentId,
    turn: TurnId,
    started_at: Instant,
    cancel: CancellationToken,
    timer: Option<AbortHandle>,
}

impl SpeakingState {
    fn stop(mut self) -> (AgentId, TurnId) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        (self.agent_id, self.turn)
    }
}

#[derive(Debug)]
struct Floor {
    queue: Vec<SpeakRequest>,
    speaking: Option<SpeakingState>,
    paused: bool,
    message_count: u32,
    round_limit: u32,
    /// Set when the round limit was reported; cleared by a counter reset
    exhausted: bool,
    last_turn: u64,
}

struct Inner {
    floor: Mutex<Floor>,
    events: Topic<SchedulerEvent>,
    paused_tx: watch::Sender<bool>,
    weights: ScoringWeights,
    speak_timeout: Duration,
}

/// Arbitrates who may speak. Cheap to clone; clones share one floor.
#[derive(Clone)]
pub struct SpeakScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SpeakScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakScheduler")
            .field("speak_timeout", &self.inner.speak_timeout)
            .finish_non_exhaustive()
    }
}

impl SpeakScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                floor: Mutex::new(Floor {
                    queue: Vec::new(),
                    speaking: None,
                    paused: false,
                    message_count: 0,
                    round_limit: config.round_limit,
                    exhausted: false,
                    last_turn: 0,
                }),
                events: Topic::new(),
                paused_tx,
                weights: config.scoring,
                speak_timeout: config.speak_timeout,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Floor> {
        self.inner.floor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn publish(&self, event: SchedulerEvent) {
        self.inner.events.publish(event);
    }

    // ==================== Requests ====================

    /// Enqueue a request and try to grant immediately. Never blocks.
    ///
    /// A pending request from the same agent is replaced.
    pub fn submit(&self, request: SpeakRequest) {
        {
            let mut floor = self.lock();
            let before = floor.queue.len();
            floor.queue.retain(|r| r.agent_id != request.agent_id);
            debug!(
                agent_id = %request.agent_id,
                reason = %request.reason.kind,
                replaced = before != floor.queue.len(),
                "Speak request submitted"
            );
            floor.queue.push(request);
        }
        self.arbitrate();
    }

    /// Release the floor if `agent_id` holds it. Counts as a finished turn.
    pub fn complete_speaking(&self, agent_id: &AgentId) -> bool {
        let turn = {
            let floor = self.lock();
            match &floor.speaking {
                Some(s) if &s.agent_id == agent_id => s.turn,
                _ => return false,
            }
        };
        self.complete_turn(turn)
    }

    /// Release the floor held by `turn` and count it toward the round budget.
    pub fn complete_turn(&self, turn: TurnId) -> bool {
        self.release(turn, true)
    }

    /// Free the floor held by `turn` without counting it.
    pub fn abandon_turn(&self, turn: TurnId) -> bool {
        self.release(turn, false)
    }

    fn release(&self, turn: TurnId, counted: bool) -> bool {
        let (agent_id, count) = {
            let mut floor = self.lock();
            if floor.speaking.as_ref().map(|s| s.turn) != Some(turn) {
                return false;
            }
            let Some(speaking) = floor.speaking.take() else {
                return false;
            };
            let held_for = clock::now().saturating_duration_since(speaking.started_at);
            let (agent_id, _) = speaking.stop();
            if counted {
                floor.message_count += 1;
            }
            debug!(%agent_id, %turn, counted, ?held_for, "Floor released");
            (agent_id, counted.then_some(floor.message_count))
        };

        self.publish(SchedulerEvent::Released { agent_id, turn });
        if let Some(count) = count {
            self.publish(SchedulerEvent::MessageProcessed { count });
        }
        self.arbitrate();
        true
    }

    // ==================== Arbitration ====================

    fn arbitrate(&self) {
        let (request, turn) = {
            let mut floor = self.lock();
            if floor.speaking.is_some() || floor.paused || floor.exhausted || floor.queue.is_empty()
            {
                return;
            }

            if floor.message_count >= floor.round_limit {
                let limit = floor.round_limit;
                floor.message_count = 0;
                floor.exhausted = true;
                drop(floor);
                info!(limit, "Round limit reached");
                self.publish(SchedulerEvent::LimitReached { limit });
                return;
            }

            let now = clock::now();
            let Some(index) = select_winner(&floor.queue, &self.inner.weights, now) else {
                return;
            };
            let request = floor.queue.remove(index);
            // the winner's stale duplicates go with it
            floor.queue.retain(|r| r.agent_id != request.agent_id);

            floor.last_turn += 1;
            let turn_id = TurnId(floor.last_turn);
            let cancel = CancellationToken::new();
            let timer = self.spawn_timer(turn_id);
            floor.speaking = Some(SpeakingState {
                agent_id: request.agent_id.clone(),
                turn: turn_id,
                started_at: now,
                cancel: cancel.clone(),
                timer,
            });

            let turn = Turn::new(
                turn_id,
                request.agent_id.clone(),
                request.trigger_message_id.clone(),
                now,
                cancel,
                FloorGuard::new(self.clone(), turn_id),
            );
            (request, turn)
        };

        let agent_id = request.agent_id.clone();
        let turn_id = turn.id;
        info!(%agent_id, agent_name = %request.agent_name, turn = %turn_id, "Floor granted");
        self.publish(SchedulerEvent::Granted {
            agent_id: agent_id.clone(),
            turn: turn_id,
        });

        let callback = request.grant(turn);
        let scheduler = self.downgrade();
        spawn(async move {
            if let Err(error) = callback.await {
                warn!(%agent_id, turn = %turn_id, %error, "Turn ended with an error");
                if let Some(inner) = scheduler.upgrade() {
                    SpeakScheduler { inner }.abandon_turn(turn_id);
                }
            }
        });
    }

    fn spawn_timer(&self, turn: TurnId) -> Option<AbortHandle> {
        let scheduler = self.downgrade();
        let timeout = self.inner.speak_timeout;
        spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = scheduler.upgrade() {
                SpeakScheduler { inner }.on_timeout(turn);
            }
        })
    }

    fn on_timeout(&self, turn: TurnId) {
        let agent_id = {
            let mut floor = self.lock();
            if floor.speaking.as_ref().map(|s| s.turn) != Some(turn) {
                return;
            }
            let Some(mut speaking) = floor.speaking.take() else {
                return;
            };
            // this task is the timer
            speaking.timer = None;
            speaking.cancel.cancel();
            speaking.stop().0
        };
        warn!(%agent_id, %turn, timeout = ?self.inner.speak_timeout, "Speaker timed out");
        self.publish(SchedulerEvent::SpeakTimeout {
            agent_id: agent_id.clone(),
        });
        self.publish(SchedulerEvent::Released { agent_id, turn });
        self.arbitrate();
    }

    // ==================== Control ====================

    /// Signal the current speaker to stop.
    ///
    /// The floor stays taken until the holder completes (or times out).
    pub fn interrupt(&self, agent_id: &AgentId) -> bool {
        {
            let floor = self.lock();
            match &floor.speaking {
                Some(s) if &s.agent_id == agent_id => s.cancel.cancel(),
                _ => return false,
            }
        }
        info!(%agent_id, "Speaker interrupted");
        self.publish(SchedulerEvent::SpeakInterrupted {
            agent_id: agent_id.clone(),
        });
        true
    }

    /// Pausing drops pending requests and takes the floor away from the
    /// current speaker. Unpausing re-arbitrates.
    pub fn set_paused(&self, paused: bool) {
        let interrupted = {
            let mut floor = self.lock();
            floor.paused = paused;
            if paused {
                floor.queue.clear();
                floor.speaking.take().map(|s| {
                    s.cancel.cancel();
                    s.stop()
                })
            } else {
                None
            }
        };
        self.inner.paused_tx.send_replace(paused);
        debug!(paused, "Scheduler pause state changed");

        if let Some((agent_id, turn)) = interrupted {
            info!(%agent_id, %turn, "Speaker interrupted by pause");
            self.publish(SchedulerEvent::SpeakInterrupted {
                agent_id: agent_id.clone(),
            });
            self.publish(SchedulerEvent::Released { agent_id, turn });
        }
        if !paused {
            self.arbitrate();
        }
    }

    /// Drop pending requests, the round counter and the current speaker.
    pub fn clear(&self) {
        let interrupted = {
            let mut floor = self.lock();
            floor.queue.clear();
            floor.message_count = 0;
            floor.exhausted = false;
            floor.speaking.take().map(|s| {
                s.cancel.cancel();
                s.stop()
            })
        };
        debug!("Scheduler cleared");
        if let Some((agent_id, turn)) = interrupted {
            self.publish(SchedulerEvent::SpeakInterrupted {
                agent_id: agent_id.clone(),
            });
            self.publish(SchedulerEvent::Released { agent_id, turn });
        }
    }

    /// Zero the round counter and lift the exhausted state.
    pub fn reset_counter(&self) {
        {
            let mut floor = self.lock();
            floor.message_count = 0;
            floor.exhausted = false;
        }
        self.arbitrate();
    }

    pub fn set_round_limit(&self, limit: u32) {
        self.lock().round_limit = limit;
    }

    // ==================== Queries ====================

    pub fn round_limit(&self) -> u32 {
        self.lock().round_limit
    }

    pub fn message_count(&self) -> u32 {
        self.lock().message_count
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Watch the pause flag
    pub fn paused(&self) -> watch::Receiver<bool> {
        self.inner.paused_tx.subscribe()
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock().exhausted
    }

    pub fn current_speaker(&self) -> Option<AgentId> {
        self.lock().speaking.as_ref().map(|s| s.agent_id.clone())
    }

    pub fn current_turn(&self) -> Option<TurnId> {
        self.lock().speaking.as_ref().map(|s| s.turn)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_pending(&self, agent_id: &AgentId) -> bool {
        self.lock().queue.iter().any(|r| &r.agent_id == agent_id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }
}

/// Index of the best request: highest score, then oldest.
fn select_winner(queue: &[SpeakRequest], weights: &ScoringWeights, now: Instant) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, request) in queue.iter().enumerate() {
        let waited = now.saturating_duration_since(request.created_at);
        let score = weights.score(&request.reason, request.priority, waited);
        debug!(
            agent_id = %request.agent_id,
            reason = %request.reason.kind,
            score,
            "Scored speak request"
        );
        let better = match best {
            None => true,
            Some((current, best_score)) => {
                score > best_score
                    || (score == best_score && request.created_at < queue[current].created_at)
            }
        };
        if better {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

fn spawn<F>(future: F) -> Option<AbortHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future).abort_handle()),
        Err(_) => {
            warn!("No async runtime available; scheduler task dropped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TurnError;
    use roundtable_domain::{ReasonFactors, SpeakReason, SpeakReasonKind};
    use tokio::sync::mpsc;

    fn scheduler(round_limit: u32) -> SpeakScheduler {
        SpeakScheduler::new(SchedulerConfig::default().with_round_limit(round_limit))
    }

    /// A request whose callback hands the turn to the test
    fn request(agent: &str, reason: SpeakReason, turns: &mpsc::UnboundedSender<Turn>) -> SpeakRequest {
        let turns = turns.clone();
        SpeakRequest::new(AgentId::new(agent), agent, reason, move |turn| async move {
            let _ = turns.send(turn);
            Ok(())
        })
    }

    fn moderator_auto_reply(relevance: f64) -> SpeakReason {
        SpeakReason::auto_reply().with_factors(ReasonFactors {
            is_moderator: true,
            context_relevance: Some(relevance),
            ..Default::default()
        })
    }

    fn drain(rx: &mut broadcast::Receiver<SchedulerEvent>) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<SchedulerEvent>,
        matches: impl Fn(&SchedulerEvent) -> bool,
    ) -> SchedulerEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if matches(&event) {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_one_speaker_at_a_time() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("b", SpeakReason::mentioned(), &tx));

        let first = turns.recv().await.unwrap();
        assert_eq!(first.agent_id.as_str(), "a");
        assert_eq!(scheduler.current_speaker(), Some(AgentId::new("a")));
        assert!(scheduler.is_pending(&AgentId::new("b")));
        assert!(turns.try_recv().is_err());

        assert!(first.complete());
        let second = turns.recv().await.unwrap();
        assert_eq!(second.agent_id.as_str(), "b");
        assert_eq!(scheduler.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_requests_are_replaced() {
        let scheduler = scheduler(20);
        let (tx, _turns) = mpsc::unbounded_channel();
        scheduler.set_paused(true);

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("a", SpeakReason::mentioned(), &tx));
        scheduler.submit(request("b", SpeakReason::auto_reply(), &tx));

        assert_eq!(scheduler.pending_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mention_then_boosted_moderator_then_auto_reply() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();
        scheduler.set_paused(true);

        scheduler.submit(request("participant", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("mentioned", SpeakReason::mentioned(), &tx));
        scheduler.submit(request("moderator", moderator_auto_reply(0.9), &tx));
        scheduler.set_paused(false);

        let mut order = Vec::new();
        for _ in 0..3 {
            let turn = turns.recv().await.unwrap();
            order.push(turn.agent_id.to_string());
            turn.complete();
        }
        assert_eq!(order, vec!["mentioned", "moderator", "participant"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_go_to_the_oldest_request() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();
        scheduler.set_paused(true);

        let now = clock::now();
        scheduler.submit(
            request("late", SpeakReason::auto_reply(), &tx).with_created_at(now),
        );
        scheduler.submit(
            request("early", SpeakReason::auto_reply(), &tx)
                .with_created_at(now - Duration::from_millis(1)),
        );
        scheduler.set_paused(false);

        assert_eq!(turns.recv().await.unwrap().agent_id.as_str(), "early");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_bonus_bounds_starvation() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();
        scheduler.set_paused(true);

        let low = SpeakReason::new(SpeakReasonKind::Other, "low");
        scheduler.submit(request("patient", low, &tx));
        // 30 + 20 (capped wait bonus) ties a fresh auto reply; age breaks the tie
        tokio::time::advance(Duration::from_secs(200)).await;
        scheduler.submit(request("fresh", SpeakReason::auto_reply(), &tx));
        scheduler.set_paused(false);

        assert_eq!(turns.recv().await.unwrap().agent_id.as_str(), "patient");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_clears_floor_and_grants_next() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("slow", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("next", SpeakReason::auto_reply(), &tx));
        let slow = turns.recv().await.unwrap();

        let event = wait_for(&mut events, |e| matches!(e, SchedulerEvent::SpeakTimeout { .. })).await;
        assert_eq!(
            event,
            SchedulerEvent::SpeakTimeout {
                agent_id: AgentId::new("slow")
            }
        );
        assert!(slow.is_cancelled());

        let next = turns.recv().await.unwrap();
        assert_eq!(next.agent_id.as_str(), "next");

        // the late completion must not release the newer turn
        assert!(!slow.complete());
        assert_eq!(scheduler.current_speaker(), Some(AgentId::new("next")));
        assert_eq!(scheduler.message_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_turn_does_not_time_out() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        turns.recv().await.unwrap().complete();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(
            !drain(&mut events)
                .iter()
                .any(|e| matches!(e, SchedulerEvent::SpeakTimeout { .. }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_reached_fires_once_until_reset() {
        let scheduler = scheduler(2);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        for agent in ["a", "b"] {
            scheduler.submit(request(agent, SpeakReason::auto_reply(), &tx));
            turns.recv().await.unwrap().complete();
        }
        assert_eq!(scheduler.message_count(), 2);

        scheduler.submit(request("c", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("d", SpeakReason::auto_reply(), &tx));
        tokio::task::yield_now().await;

        let limit_events: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, SchedulerEvent::LimitReached { .. }))
            .collect();
        assert_eq!(limit_events, vec![SchedulerEvent::LimitReached { limit: 2 }]);
        assert!(scheduler.is_exhausted());
        assert_eq!(scheduler.current_speaker(), None);
        assert_eq!(scheduler.message_count(), 0);
        assert!(turns.try_recv().is_err());

        scheduler.reset_counter();
        assert_eq!(turns.recv().await.unwrap().agent_id.as_str(), "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_error_frees_the_floor() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(SpeakRequest::new(
            AgentId::new("broken"),
            "broken",
            SpeakReason::mentioned(),
            |_turn| async { Err(TurnError::Other("backend exploded".into())) },
        ));
        scheduler.submit(request("healthy", SpeakReason::auto_reply(), &tx));

        let turn = turns.recv().await.unwrap();
        assert_eq!(turn.agent_id.as_str(), "healthy");
        assert_eq!(scheduler.message_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_interrupts_speaker_and_drops_queue() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        scheduler.submit(request("b", SpeakReason::auto_reply(), &tx));
        let turn = turns.recv().await.unwrap();

        scheduler.set_paused(true);
        assert!(turn.is_cancelled());
        assert_eq!(scheduler.current_speaker(), None);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(*scheduler.paused().borrow());
        assert!(drain(&mut events).contains(&SchedulerEvent::SpeakInterrupted {
            agent_id: AgentId::new("a")
        }));

        // no grants while paused
        scheduler.submit(request("c", SpeakReason::mentioned(), &tx));
        tokio::task::yield_now().await;
        assert!(turns.try_recv().is_err());
        assert!(!turn.complete());

        scheduler.set_paused(false);
        assert_eq!(turns.recv().await.unwrap().agent_id.as_str(), "c");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_keeps_floor_until_completion() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        let turn = turns.recv().await.unwrap();

        assert!(scheduler.interrupt(&AgentId::new("a")));
        assert!(!scheduler.interrupt(&AgentId::new("b")));
        assert!(turn.is_cancelled());
        assert_eq!(scheduler.current_speaker(), Some(AgentId::new("a")));

        assert!(turn.complete());
        let released: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, SchedulerEvent::Released { .. }))
            .collect();
        assert_eq!(released.len(), 1);
        assert_eq!(scheduler.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_turn_releases_once_without_counting() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        drop(turns.recv().await.unwrap());

        assert_eq!(scheduler.current_speaker(), None);
        assert!(!scheduler.complete_speaking(&AgentId::new("a")));
        let released = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, SchedulerEvent::Released { .. }))
            .count();
        assert_eq!(released, 1);
        assert_eq!(scheduler.message_count(), 0);
    }

    fn released(events: &[SchedulerEvent]) -> Vec<&AgentId> {
        events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Released { agent_id, .. } => Some(agent_id),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_lost_floor_is_released_once() {
        let scheduler = scheduler(20);
        let mut events = scheduler.subscribe();
        let (tx, mut turns) = mpsc::unbounded_channel();

        // timeout
        scheduler.submit(request("slow", SpeakReason::auto_reply(), &tx));
        let slow = turns.recv().await.unwrap();
        wait_for(&mut events, |e| matches!(e, SchedulerEvent::SpeakTimeout { .. })).await;
        let after_timeout = drain(&mut events);
        assert_eq!(released(&after_timeout), vec![&AgentId::new("slow")]);
        assert!(!slow.complete());
        assert!(released(&drain(&mut events)).is_empty());

        // pause
        scheduler.submit(request("paused", SpeakReason::auto_reply(), &tx));
        let paused = turns.recv().await.unwrap();
        drain(&mut events);
        scheduler.set_paused(true);
        drop(paused);
        assert_eq!(released(&drain(&mut events)), vec![&AgentId::new("paused")]);
        scheduler.set_paused(false);

        // clear
        scheduler.submit(request("cleared", SpeakReason::auto_reply(), &tx));
        let cleared = turns.recv().await.unwrap();
        drain(&mut events);
        scheduler.clear();
        assert!(!cleared.complete());
        assert_eq!(released(&drain(&mut events)), vec![&AgentId::new("cleared")]);

        // nothing held, nothing released
        scheduler.clear();
        scheduler.set_paused(true);
        assert!(released(&drain(&mut events)).is_empty());
        assert_eq!(scheduler.message_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_speaking_by_agent_id() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        let turn = turns.recv().await.unwrap();

        assert!(!scheduler.complete_speaking(&AgentId::new("b")));
        assert!(scheduler.complete_speaking(&AgentId::new("a")));
        assert_eq!(scheduler.message_count(), 1);
        // the guard's own release is now stale
        assert!(!turn.complete());
        assert_eq!(scheduler.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_everything() {
        let scheduler = scheduler(20);
        let (tx, mut turns) = mpsc::unbounded_channel();

        scheduler.submit(request("a", SpeakReason::auto_reply(), &tx));
        turns.recv().await.unwrap().complete();
        scheduler.submit(request("b", SpeakReason::auto_reply(), &tx));
        let held = turns.recv().await.unwrap();
        scheduler.submit(request("c", SpeakReason::auto_reply(), &tx));
        assert_eq!(scheduler.message_count(), 1);

        scheduler.clear();
        assert!(held.is_cancelled());
        assert_eq!(scheduler.current_speaker(), None);
        assert_eq!(scheduler.message_count(), 0);
        assert_eq!(scheduler.pending_count(), 0);
        assert!(!held.complete());
    }

    #[test]
    fn test_select_winner_empty_queue() {
        assert_eq!(select_winner(&[], &ScoringWeights::default(), Instant::now()), None);
    }
}
