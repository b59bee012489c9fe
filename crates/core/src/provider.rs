//! Provider trait: the abstraction over the model-inference service.
//!
//! A Provider knows how to send a conversation plus a model configuration to
//! a hosted model and hand back the reply as a stream of incremental chunks.
//!
//! Implementations: Amazon Bedrock Converse.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use crate::error::ProviderError;
use crate::message::{Message, MessageToolCall};

/// A fully-formed model configuration.
///
/// Built once per request from the model identifier; see the agent crate's
/// model configuration builder for how the provider family shapes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider model identifier (e.g., "us.amazon.nova-micro-v1:0")
    pub model_id: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Nucleus sampling; unset when the provider forbids it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Reasoning ("thinking") mode, when the model family supports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,

    /// Provider-specific request metadata forwarded verbatim
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub request_metadata: serde_json::Map<String, serde_json::Value>,
}

impl ModelConfig {
    /// Whether reasoning mode is enabled.
    pub fn reasoning_enabled(&self) -> bool {
        self.thinking.is_some()
    }
}

/// Token budget for a model's internal deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingConfig {
    pub budget_tokens: u32,
}

/// One call to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Model and inference parameters
    pub config: ModelConfig,

    /// System prompt (resolved personality)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    ContentFiltered,
    Other(String),
}

impl StopReason {
    /// Map a provider's wire value (camelCase or snake_case) to a stop reason.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "content_filtered" | "guardrail_intervened" => Self::ContentFiltered,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial text delta
    #[serde(default)]
    pub content: Option<String>,

    /// Partial reasoning delta (never shown to the caller)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Signature closing a reasoning block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_signature: Option<String>,

    /// Completed tool calls (delivered once their input is fully received)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// Why generation stopped (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl StreamChunk {
    /// A text delta chunk.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// The final chunk of a turn.
    pub fn finished(stop_reason: StopReason) -> Self {
        Self {
            stop_reason: Some(stop_reason),
            done: true,
            ..Self::default()
        }
    }
}

/// Receiving half of a provider stream.
pub type ChunkReceiver = mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The agent calls `stream()` without knowing which backend answers.
/// Dropping the returned receiver must stop the provider from reading further
/// from its upstream connection.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "bedrock").
    fn name(&self) -> &str;

    /// Send a request and get a stream of response chunks.
    ///
    /// Errors returned here happen before any chunk is produced (connection,
    /// authentication); errors after that arrive through the channel.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError>;
}
