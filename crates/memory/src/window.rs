//! In-memory sliding window: the default when no session storage is bound.

use async_trait::async_trait;
use chatrelay_core::error::SessionError;
use chatrelay_core::history::HistoryStore;
use chatrelay_core::message::Message;
use tokio::sync::RwLock;

/// The tail of `messages` holding at most `window_size` exchanges.
///
/// An exchange starts at a user message and runs up to the next one, so a
/// tool call is never separated from its result. Anything before the first
/// user message is dropped once trimming kicks in.
pub fn trim_to_exchanges(messages: &[Message], window_size: usize) -> &[Message] {
    let starts: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.starts_exchange())
        .map(|(i, _)| i)
        .collect();

    if starts.len() <= window_size {
        return messages;
    }
    if window_size == 0 {
        return &[];
    }
    &messages[starts[starts.len() - window_size]..]
}

/// Volatile history bounded to the last `window_size` exchanges.
pub struct SlidingWindowHistory {
    window_size: usize,
    messages: RwLock<Vec<Message>>,
}

impl SlidingWindowHistory {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            messages: RwLock::new(Vec::new()),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}

#[async_trait]
impl HistoryStore for SlidingWindowHistory {
    fn name(&self) -> &str {
        "sliding_window"
    }

    fn is_persistent(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Vec<Message>, SessionError> {
        Ok(self.messages.read().await.clone())
    }

    async fn save(&self, messages: &[Message]) -> Result<(), SessionError> {
        let kept = trim_to_exchanges(messages, self.window_size);
        if kept.len() < messages.len() {
            tracing::debug!(
                dropped = messages.len() - kept.len(),
                window = self.window_size,
                "Trimmed conversation window"
            );
        }
        *self.messages.write().await = kept.to_vec();
        Ok(())
    }
}
