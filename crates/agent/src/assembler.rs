//! Agent assembly: one inbound request in, one ready agent out.
//!
//! A fresh agent is built for every request. Only the collaborators that
//! are safe to share (HTTP clients, configuration) live in the factory.

use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_core::error::Error;
use chatrelay_core::history::HistoryStore;
use chatrelay_core::provider::Provider;
use chatrelay_memory::{ObjectStore, S3Client, S3SessionStore, SlidingWindowHistory};
use chatrelay_tools::RetrievalClient;
use serde::Deserialize;
use tracing::info;

use crate::agent::Agent;
use crate::model::build_model_config;
use crate::persona::resolve_personality;
use crate::session::SessionBinding;
use crate::tools::select_tools;

/// Prompt used when a request carries none.
pub const DEFAULT_PROMPT: &str = "No prompt found in input...";

/// Session id used when a request carries none.
pub const DEFAULT_SESSION_ID: &str = "default-session";

/// An inbound request, as posted to `/invocations`.
///
/// `model` and `personality` fall back to the configured defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentRequest {
    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub personality: Option<String>,

    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Bucket for persistent history; empty disables persistence
    #[serde(rename = "s3sessionbucket", default)]
    pub storage_bucket: String,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

impl Default for AgentRequest {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            model: None,
            personality: None,
            session_id: default_session_id(),
            storage_bucket: String::new(),
        }
    }
}

impl AgentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Builds agents from requests.
pub struct AgentFactory {
    config: Arc<AppConfig>,
    provider: Arc<dyn Provider>,
    retrieval: Arc<dyn RetrievalClient>,
    object_store: Option<Arc<dyn ObjectStore>>,
}

impl AgentFactory {
    pub fn new(
        config: Arc<AppConfig>,
        provider: Arc<dyn Provider>,
        retrieval: Arc<dyn RetrievalClient>,
        object_store: Option<Arc<dyn ObjectStore>>,
    ) -> Self {
        Self {
            config,
            provider,
            retrieval,
            object_store,
        }
    }

    /// Wire the AWS-backed collaborators described by `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let provider = chatrelay_providers::build_from_config(&config)?;
        let retrieval = chatrelay_tools::build_retrieval_client(&config)
            .map_err(|e| Error::Internal(format!("retrieval client: {e}")))?;
        let object_store = S3Client::from_config(&config)?
            .map(|client| Arc::new(client) as Arc<dyn ObjectStore>);

        Ok(Self::new(Arc::new(config), provider, retrieval, object_store))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Model id a request resolves to.
    pub fn model_for<'a>(&'a self, request: &'a AgentRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.default_model)
    }

    /// Personality key (or literal prompt) a request resolves to.
    pub fn personality_for<'a>(&'a self, request: &'a AgentRequest) -> &'a str {
        request
            .personality
            .as_deref()
            .unwrap_or(&self.config.default_personality)
    }

    /// Storage binding a request resolves to, if persistence applies.
    ///
    /// Only the request's own bucket counts; an empty bucket disables
    /// persistence.
    pub fn binding_for(&self, request: &AgentRequest) -> Option<SessionBinding> {
        SessionBinding::resolve(&request.session_id, &request.storage_bucket)
    }

    /// Build the agent for one request.
    pub fn assemble(&self, request: &AgentRequest) -> Result<Arc<Agent>, Error> {
        let model_id = self.model_for(request);
        let personality = self.personality_for(request);
        let window = self.config.history.window_size;

        let history: Box<dyn HistoryStore> = match self.binding_for(request) {
            Some(binding) => {
                let Some(store) = &self.object_store else {
                    return Err(Error::config(format!(
                        "session storage requested in bucket '{}' but no AWS access keys are configured",
                        binding.bucket
                    )));
                };
                let store = S3SessionStore::new(
                    Arc::clone(store),
                    binding.bucket,
                    &binding.prefix,
                    &binding.session_id,
                )
                .with_context_window(window);
                info!(location = %store.location(), "Using persistent session history");
                Box::new(store)
            }
            None => Box::new(SlidingWindowHistory::new(window)),
        };

        let tools = select_tools(
            personality,
            &self.config.knowledge_bases,
            &self.config.aws.region,
            Arc::clone(&self.retrieval),
        );

        info!(
            model = %model_id,
            session = %request.session_id,
            tools = tools.len(),
            "Assembled agent"
        );

        let agent = Agent::new(
            Arc::clone(&self.provider),
            build_model_config(model_id),
            resolve_personality(personality),
            tools,
            history,
        )
        .with_max_model_calls(self.config.max_model_calls);

        Ok(Arc::new(agent))
    }
}
