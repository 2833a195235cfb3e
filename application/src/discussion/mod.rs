//! Discussion lifecycle: the manager, its errors and its cleanup tiers.

mod cleanup;
mod error;
mod manager;

pub use cleanup::{CleanupRegistry, CleanupTiers, TimerSet};
pub use error::{DiscussionError, DiscussionErrorKind, ErrorContext};
pub use manager::{DiscussionManager, DiscussionManagerBuilder};
