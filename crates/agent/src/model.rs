//! Model configuration: from a model identifier to inference parameters.
//!
//! Two families are distinguished. Anthropic models on Bedrock run with
//! extended reasoning, which dictates temperature and forbids `top_p`.
//! Everything else, known or not, gets the conservative defaults.

use chatrelay_core::provider::{ModelConfig, ThinkingConfig};
use serde_json::json;

pub use chatrelay_config::DEFAULT_MODEL_ID;

/// Thinking budget for reasoning-mode models.
pub const THINKING_BUDGET_TOKENS: u32 = 2048;

/// Beta flag enabling reasoning between tool calls.
pub const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";

const ANTHROPIC_PREFIXES: [&str; 4] = ["anthropic.", "us.anthropic.", "eu.anthropic.", "apac.anthropic."];
const AMAZON_PREFIXES: [&str; 4] = ["amazon.", "us.amazon.", "eu.amazon.", "apac.amazon."];

/// A model family, by Bedrock identifier prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFamily {
    Anthropic,
    Amazon,
    Other,
}

impl ProviderFamily {
    pub fn classify(model_id: &str) -> Self {
        if ANTHROPIC_PREFIXES.iter().any(|p| model_id.starts_with(p)) {
            Self::Anthropic
        } else if AMAZON_PREFIXES.iter().any(|p| model_id.starts_with(p)) {
            Self::Amazon
        } else {
            Self::Other
        }
    }

    pub fn supports_reasoning(self) -> bool {
        self == Self::Anthropic
    }
}

/// A model offered to callers, for listings.
#[derive(Debug, Clone, Copy)]
pub struct KnownModel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const KNOWN_MODELS: [KnownModel; 4] = [
    KnownModel {
        id: "us.amazon.nova-micro-v1:0",
        name: "Amazon Nova Micro",
        description: "Fast and efficient for simple tasks",
    },
    KnownModel {
        id: "us.amazon.nova-pro-v1:0",
        name: "Amazon Nova Pro",
        description: "Balanced performance and capability",
    },
    KnownModel {
        id: "us.amazon.nova-premier-v1:0",
        name: "Amazon Nova Premier",
        description: "Most capable Nova model",
    },
    KnownModel {
        id: "us.anthropic.claude-sonnet-4-20250514-v1:0",
        name: "Claude Sonnet 4",
        description: "Advanced reasoning and analysis",
    },
];

/// Build the full configuration for `model_id`. Never fails.
pub fn build_model_config(model_id: &str) -> ModelConfig {
    match ProviderFamily::classify(model_id) {
        ProviderFamily::Anthropic => {
            let mut request_metadata = serde_json::Map::new();
            request_metadata.insert("anthropic_beta".into(), json!([INTERLEAVED_THINKING_BETA]));
            ModelConfig {
                model_id: model_id.to_string(),
                max_tokens: 4096,
                // Reasoning mode only accepts temperature 1.0.
                temperature: 1.0,
                top_p: None,
                thinking: Some(ThinkingConfig {
                    budget_tokens: THINKING_BUDGET_TOKENS,
                }),
                request_metadata,
            }
        }
        ProviderFamily::Amazon | ProviderFamily::Other => ModelConfig {
            model_id: model_id.to_string(),
            max_tokens: 2000,
            temperature: 0.3,
            top_p: Some(0.8),
            thinking: None,
            request_metadata: serde_json::Map::new(),
        },
    }
}
