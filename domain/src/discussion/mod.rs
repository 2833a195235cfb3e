//! Discussion domain module
//!
//! The message log, membership, settings, the aggregate [`DiscussionState`]
//! with its validated transitions, and the events published while a
//! discussion runs.

pub mod event;
pub mod member;
pub mod message;
pub mod settings;
pub mod state;

pub use event::DiscussionEvent;
pub use member::Member;
pub use message::{Author, Message, MessageStatus, NewMessage};
pub use settings::{DiscussionSettings, ModerationStyle};
pub use state::{Discussion, DiscussionState};
