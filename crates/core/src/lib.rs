//! # chatrelay core
//!
//! Domain types, traits, and error definitions shared by every chatrelay crate.
//! This crate has no transport or cloud dependencies: it defines the seams
//! (model provider, tool, conversation history) that the other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator is a trait here:
//! - [`Provider`]: a model-inference service returning a stream of chunks
//! - [`Tool`]: a callable capability attached to an agent
//! - [`HistoryStore`]: where a conversation's messages live between turns
//!
//! Implementations live in their own crates, so orchestration logic can be
//! tested against in-process fakes.

pub mod error;
pub mod history;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, SessionError, ToolError};
pub use history::HistoryStore;
pub use message::{Message, MessageToolCall, Reasoning, Role};
pub use provider::{
    ChunkReceiver, ModelConfig, Provider, ProviderRequest, StopReason, StreamChunk, ThinkingConfig,
    ToolDefinition, Usage,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
