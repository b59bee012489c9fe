//! Agent assembly and streaming for chatrelay.
//!
//! Each inbound request is turned into its own agent:
//!
//! 1. **Model**: the model id picks a [`ModelConfig`](chatrelay_core::ModelConfig) by provider family
//! 2. **Personality**: a preset key or a literal prompt becomes the system prompt
//! 3. **Tools**: the `fomc` and `scotus` personalities get a knowledge-base search tool
//! 4. **Session**: a session id plus a bucket binds persistent history in S3;
//!    otherwise a sliding window in memory
//!
//! The agent's text stream is then relayed to the caller as `start`,
//! `token`*, `error`?, `done`.

pub mod agent;
pub mod assembler;
pub mod model;
pub mod persona;
pub mod relay;
pub mod session;
pub mod tools;

pub use agent::{Agent, FragmentReceiver, TurnOutcome};
pub use assembler::{AgentFactory, AgentRequest, DEFAULT_PROMPT, DEFAULT_SESSION_ID};
pub use model::{KNOWN_MODELS, KnownModel, ProviderFamily, build_model_config};
pub use persona::{Personality, PersonalitySelection, resolve_personality};
pub use relay::{RelayState, StreamEvent, drive, relay};
pub use session::{SessionBinding, generate_session_id, split_session_id};
pub use tools::select_tools;
