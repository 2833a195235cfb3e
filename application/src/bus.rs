//! Event and state plumbing
//!
//! [`Topic`] is a typed pub/sub channel built on a tokio broadcast channel.
//! [`StateStore`] holds an owned value behind a watch channel and commits
//! changes only when the update closure succeeds.

use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{trace, warn};

/// Channel capacity for broadcast
pub const CHANNEL_CAPACITY: usize = 256;

/// Typed broadcast topic
#[derive(Debug)]
pub struct Topic<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> Topic<T> {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers.
    ///
    /// Returns the number of receivers. Having none is not an error.
    pub fn publish(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                trace!("Event published (no receivers)");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive the next event, skipping over lag.
///
/// Returns `None` once the channel is closed.
pub async fn recv_lossy<T: Clone>(
    rx: &mut broadcast::Receiver<T>,
    subscriber: &str,
) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(subscriber, skipped, "Subscriber lagged; events dropped");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// Owned state with validated, observable updates
#[derive(Debug)]
pub struct StateStore<T> {
    sender: watch::Sender<T>,
    writer: Mutex<()>,
}

impl<T: Clone> StateStore<T> {
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender,
            writer: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Read without cloning the whole value
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sender.borrow())
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Apply `f` to a draft copy and commit it only if `f` succeeds.
    ///
    /// Observers are notified only on commit. Writers are serialized.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut draft = self.snapshot();
        let value = f(&mut draft)?;
        self.sender.send_replace(draft);
        Ok(value)
    }

    /// Apply an infallible change and notify observers
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.sender.send_modify(f);
    }
}
