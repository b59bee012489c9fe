//! Stream relay: republishes an agent's text stream as typed events.
//!
//! Every relayed stream has the shape `start, token*, error?, done`. The
//! relay runs as its own task and forwards over a bounded channel; when the
//! consumer goes away it drops the agent's receiver, which ends the turn.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::agent::FragmentReceiver;

/// Events sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Generation has begun.
    Start,

    /// A fragment of model text.
    Token { text: String },

    /// Generation failed; `done` follows.
    Error { message: String },

    /// The stream is complete.
    Done,
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Token { .. } => "token",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Where a relay is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Init,
    Streaming,
    Failed,
    Done,
    /// The consumer stopped listening before `done` was delivered.
    Disconnected,
}

/// Drive `fragments` to completion, sending events to `tx`.
///
/// Returns the state the relay ended in: `Done` when the full sequence was
/// delivered, `Disconnected` otherwise.
pub async fn drive(mut fragments: FragmentReceiver, tx: mpsc::Sender<StreamEvent>) -> RelayState {
    let mut state = RelayState::Init;

    loop {
        let event = match state {
            RelayState::Init => {
                state = RelayState::Streaming;
                StreamEvent::Start
            }
            RelayState::Streaming => match fragments.recv().await {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => StreamEvent::Token { text },
                Some(Err(e)) => {
                    state = RelayState::Failed;
                    StreamEvent::Error {
                        message: e.to_string(),
                    }
                }
                None => {
                    state = RelayState::Done;
                    StreamEvent::Done
                }
            },
            RelayState::Failed => {
                state = RelayState::Done;
                StreamEvent::Done
            }
            RelayState::Done | RelayState::Disconnected => return state,
        };

        if tx.send(event).await.is_err() {
            debug!("Relay consumer disconnected, dropping agent stream");
            return RelayState::Disconnected;
        }
    }
}

/// Spawn a relay for `fragments` and return its event stream.
pub fn relay(fragments: FragmentReceiver) -> mpsc::Receiver<StreamEvent> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(drive(fragments, tx));
    rx
}
