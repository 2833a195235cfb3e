//! Generation backend port
//!
//! Defines how an agent obtains its reply. The actual language-model call
//! lives in an infrastructure adapter.

use async_trait::async_trait;
use roundtable_domain::{GenerationContext, StreamEvent};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during generation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Handle for receiving streamed chunks.
///
/// The stream is lazy: chunks are produced as the receiver drains them.
/// Dropping the handle cancels the stream, since the producer's next send
/// fails.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, GenerationError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => return Err(GenerationError::Stream(e)),
            }
        }
        // Channel closed without Completed; return what we have
        Ok(full_text)
    }
}

/// Backend that produces agent replies
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Produce the whole reply at once
    async fn generate(&self, context: &GenerationContext) -> Result<String, GenerationError>;

    /// Produce the reply as a chunk stream.
    ///
    /// Default implementation calls `generate()` and wraps the result in a
    /// single `Completed` event.
    async fn stream_generate(
        &self,
        context: &GenerationContext,
    ) -> Result<StreamHandle, GenerationError> {
        let text = self.generate(context).await?;
        let (tx, rx) = mpsc::channel(1);
        // receiver dropped means nobody wants it anymore
        let _ = tx.send(StreamEvent::Completed(text)).await;
        Ok(StreamHandle::new(rx))
    }
}
