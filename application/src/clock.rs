//! Monotonic time source for the application layer.
//!
//! Reads tokio's clock so paused-time tests drive every deadline, score
//! and delay consistently.

use std::time::Instant;

pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
