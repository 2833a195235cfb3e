//! Speak arbitration
//!
//! [`SpeakScheduler`] accepts competing [`SpeakRequest`]s and hands the
//! floor to exactly one of them at a time. The winner receives a [`Turn`]
//! that owns the floor until it is completed or dropped.

mod request;
mod speak_scheduler;
mod turn;

pub use request::{GrantFuture, SpeakRequest};
pub use speak_scheduler::SpeakScheduler;
pub use turn::{FloorGuard, Turn, TurnError};
