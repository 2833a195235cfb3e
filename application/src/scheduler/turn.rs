//! Granted turns and floor ownership

use super::speak_scheduler::SpeakScheduler;
use crate::ports::generation::GenerationError;
use crate::ports::storage::StorageError;
use roundtable_domain::{AgentId, DomainError, MessageId, TurnId};
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a turn ended without a reply
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TurnError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Turn failed: {0}")]
    Other(String),
}

/// Ownership of the floor for one turn.
///
/// [`release`](FloorGuard::release) hands the floor back as a finished turn
/// and counts it toward the round budget. Dropping the guard without
/// releasing abandons the turn: the floor is freed but nothing is counted.
/// Either way the scheduler hears about it once; releases for a turn that
/// already lost the floor (timeout, pause) are ignored.
#[derive(Debug)]
pub struct FloorGuard {
    scheduler: SpeakScheduler,
    turn: TurnId,
    released: bool,
}

impl FloorGuard {
    pub(crate) fn new(scheduler: SpeakScheduler, turn: TurnId) -> Self {
        Self {
            scheduler,
            turn,
            released: false,
        }
    }

    /// Returns `false` if this turn no longer held the floor.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.scheduler.complete_turn(self.turn)
    }
}

impl Drop for FloorGuard {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.scheduler.abandon_turn(self.turn);
        }
    }
}

/// A granted turn, handed to the winning request's callback
#[derive(Debug)]
pub struct Turn {
    pub id: TurnId,
    pub agent_id: AgentId,
    pub trigger_message_id: Option<MessageId>,
    pub started_at: Instant,
    cancel: CancellationToken,
    floor: FloorGuard,
}

impl Turn {
    pub(crate) fn new(
        id: TurnId,
        agent_id: AgentId,
        trigger_message_id: Option<MessageId>,
        started_at: Instant,
        cancel: CancellationToken,
        floor: FloorGuard,
    ) -> Self {
        Self {
            id,
            agent_id,
            trigger_message_id,
            started_at,
            cancel,
            floor,
        }
    }

    /// Fires on timeout, interruption, pause or clear
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Finish the turn and give the floor back.
    pub fn complete(self) -> bool {
        self.floor.release()
    }
}
