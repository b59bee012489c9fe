//! History trait: where one agent's conversation lives between turns.
//!
//! Two kinds of store exist: a volatile, in-process sliding window, and a
//! persistent store backed by object storage. An agent owns exactly one store
//! and the store is bound to a single session when it is built, so the agent
//! never needs to know which kind it has.

use async_trait::async_trait;
use crate::error::SessionError;
use crate::message::Message;

/// The core HistoryStore trait.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The backend name (e.g., "sliding_window", "s3").
    fn name(&self) -> &str;

    /// Whether history survives the process.
    fn is_persistent(&self) -> bool;

    /// Load the messages the model should see on the next turn.
    async fn load(&self) -> std::result::Result<Vec<Message>, SessionError>;

    /// Replace the stored history with `messages`.
    ///
    /// Stores may retain fewer messages than given (a sliding window trims
    /// the oldest exchanges).
    async fn save(&self, messages: &[Message]) -> std::result::Result<(), SessionError>;
}
