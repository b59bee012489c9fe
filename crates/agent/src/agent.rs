//! The agent turn loop.
//!
//! One turn: load history → append the prompt → stream the model's reply →
//! run any requested tools and call the model again → save history. Text
//! deltas are forwarded to the caller as they arrive; reasoning is kept in
//! the history but never forwarded.

use std::sync::Arc;

use chatrelay_core::error::{Error, ProviderError};
use chatrelay_core::history::HistoryStore;
use chatrelay_core::message::{Message, Reasoning};
use chatrelay_core::provider::{ModelConfig, Provider, ProviderRequest, StreamChunk};
use chatrelay_core::tool::{ToolCall, ToolRegistry};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default upper bound on model calls in one turn.
pub const DEFAULT_MAX_MODEL_CALLS: usize = 10;

/// Receiving half of an agent's text stream.
pub type FragmentReceiver = mpsc::Receiver<Result<String, Error>>;

/// How a turn ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The caller stopped listening; history was left as it was.
    Abandoned,
}

/// A fully configured agent: one model, one prompt, one tool set, one history.
pub struct Agent {
    provider: Arc<dyn Provider>,
    config: ModelConfig,
    system_prompt: String,
    tools: ToolRegistry,
    history: Box<dyn HistoryStore>,
    max_model_calls: usize,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        config: ModelConfig,
        system_prompt: impl Into<String>,
        tools: ToolRegistry,
        history: Box<dyn HistoryStore>,
    ) -> Self {
        Self {
            provider,
            config,
            system_prompt: system_prompt.into(),
            tools,
            history,
            max_model_calls: DEFAULT_MAX_MODEL_CALLS,
        }
    }

    /// Set the maximum number of model calls per turn.
    pub fn with_max_model_calls(mut self, max: usize) -> Self {
        self.max_model_calls = max.max(1);
        self
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.names()
    }

    pub fn history(&self) -> &dyn HistoryStore {
        self.history.as_ref()
    }

    /// Run one turn in a background task and stream its text.
    ///
    /// The receiver yields text fragments, then at most one error. A turn
    /// that panics is reported as an internal error. Dropping the receiver
    /// ends the turn at its next await.
    pub fn stream(self: &Arc<Self>, prompt: impl Into<String>) -> FragmentReceiver {
        let (tx, rx) = mpsc::channel(64);
        let agent = Arc::clone(self);
        let prompt = prompt.into();

        tokio::spawn(async move {
            let turn = tokio::spawn({
                let agent = Arc::clone(&agent);
                let tx = tx.clone();
                async move { agent.run_turn(prompt, &tx).await }
            });
            let result = match turn.await {
                Ok(result) => result.map(|_| ()),
                Err(e) => Err(Error::Internal(format!("agent turn aborted: {e}"))),
            };
            if let Err(e) = result {
                warn!(model = %agent.config.model_id, error = %e, "Agent turn failed");
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    /// Run one turn, sending text fragments to `tx`.
    pub async fn run_turn(
        &self,
        prompt: String,
        tx: &mpsc::Sender<Result<String, Error>>,
    ) -> Result<TurnOutcome, Error> {
        let mut messages = self.history.load().await?;
        info!(
            model = %self.config.model_id,
            history = self.history.name(),
            messages = messages.len(),
            tools = self.tools.len(),
            "Starting turn"
        );
        messages.push(Message::user(prompt));

        let tool_definitions = self.tools.definitions();

        for call_number in 1..=self.max_model_calls {
            debug!(call_number, "Calling model");

            let request = ProviderRequest {
                config: self.config.clone(),
                system: Some(self.system_prompt.clone()),
                messages: messages.clone(),
                tools: tool_definitions.clone(),
            };
            let mut chunks = self.provider.stream(request).await?;

            let mut text = String::new();
            let mut reasoning: Option<Reasoning> = None;
            let mut last: Option<StreamChunk> = None;

            loop {
                let chunk = tokio::select! {
                    chunk = chunks.recv() => chunk,
                    _ = tx.closed() => {
                        debug!("Fragment receiver dropped while reading the model stream");
                        return Ok(TurnOutcome::Abandoned);
                    }
                };
                let Some(chunk) = chunk else { break };
                let mut chunk = chunk?;

                if let Some(delta) = chunk.content.take().filter(|d| !d.is_empty()) {
                    text.push_str(&delta);
                    if tx.send(Ok(delta)).await.is_err() {
                        debug!("Fragment receiver dropped, abandoning turn");
                        return Ok(TurnOutcome::Abandoned);
                    }
                }
                if let Some(delta) = chunk.reasoning.take() {
                    reasoning.get_or_insert_with(Reasoning::default).text.push_str(&delta);
                }
                if let Some(signature) = chunk.reasoning_signature.take() {
                    reasoning.get_or_insert_with(Reasoning::default).signature = Some(signature);
                }
                if chunk.done {
                    last = Some(chunk);
                    break;
                }
            }

            let last = last.ok_or_else(|| {
                ProviderError::StreamInterrupted("provider stream closed before completion".into())
            })?;
            if let Some(usage) = last.usage {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "Model call finished"
                );
            }

            let tool_calls = last.tool_calls;
            messages.push(
                Message::assistant(text)
                    .with_reasoning(reasoning)
                    .with_tool_calls(tool_calls.clone()),
            );

            if tool_calls.is_empty() {
                self.history.save(&messages).await?;
                return Ok(TurnOutcome::Completed);
            }

            debug!(tool_count = tool_calls.len(), "Executing tool calls");
            for tc in &tool_calls {
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                };

                let outcome = tokio::select! {
                    outcome = self.tools.execute(&call) => outcome,
                    _ = tx.closed() => {
                        debug!(tool = %tc.name, "Fragment receiver dropped during tool execution");
                        return Ok(TurnOutcome::Abandoned);
                    }
                };
                match outcome {
                    Ok(result) => {
                        messages.push(Message::tool_result(&tc.id, result.output, !result.success));
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        // Report the error to the model so it can recover
                        messages.push(Message::tool_result(&tc.id, format!("Error: {e}"), true));
                    }
                }
            }
        }

        Err(Error::Internal(format!(
            "model requested tools on every one of {} calls without answering",
            self.max_model_calls
        )))
    }
}
