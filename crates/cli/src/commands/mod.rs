pub mod chat;
pub mod config_cmd;
pub mod invoke;
pub mod serve;

use chatrelay_agent::{AgentRequest, generate_session_id};
use clap::Args;

/// Request options shared by `chat` and `invoke`.
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Model identifier (defaults to the configured model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Personality key, or a literal system prompt
    #[arg(short, long)]
    pub personality: Option<String>,

    /// Session id; `<namespace>-<id>` stores history under `<namespace>/`
    #[arg(short, long)]
    pub session: Option<String>,

    /// S3 bucket for persistent history (defaults to the configured bucket)
    #[arg(short, long)]
    pub bucket: Option<String>,
}

impl RequestArgs {
    /// Build the request for `prompt`. Without `--session` a fresh id is
    /// generated in the current user's namespace; without `--bucket` the
    /// configured session bucket is used.
    pub fn to_request(&self, prompt: impl Into<String>, default_bucket: Option<&str>) -> AgentRequest {
        let session_id = self.session.clone().unwrap_or_else(|| {
            generate_session_id(&std::env::var("USER").unwrap_or_default())
        });
        AgentRequest {
            prompt: prompt.into(),
            model: self.model.clone(),
            personality: self.personality.clone(),
            session_id,
            storage_bucket: self
                .bucket
                .clone()
                .or_else(|| default_bucket.map(str::to_string))
                .unwrap_or_default(),
        }
    }
}
