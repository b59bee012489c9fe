//! Tool implementations for chatrelay.
//!
//! The agent's tools ground its answers in curated document collections:
//! each tool searches one pre-bound Bedrock knowledge base.

pub mod knowledge_base;
pub mod retrieval;

pub use knowledge_base::{KnowledgeBase, KnowledgeBaseSearchTool};
pub use retrieval::{
    BedrockRetrievalClient, RetrievalClient, RetrievalError, RetrievalQuery, RetrievedSnippet,
};

use std::sync::Arc;

use chatrelay_aws::{AwsAuth, Credentials};

/// Build the retrieval client described by configuration.
///
/// Missing credentials are not an error here: the client is still built and
/// each search reports the problem as a failed tool result.
pub fn build_retrieval_client(
    config: &chatrelay_config::AppConfig,
) -> Result<Arc<dyn RetrievalClient>, RetrievalError> {
    let aws = &config.aws;
    let credentials = Credentials::from_parts(
        aws.access_key_id.as_deref(),
        aws.secret_access_key.as_deref(),
        aws.session_token.as_deref(),
    );
    let auth = AwsAuth::for_bedrock(aws.bearer_token.as_deref(), credentials);
    if auth.is_none() {
        tracing::warn!("No AWS credentials configured; knowledge-base searches will fail");
    }

    let mut client = BedrockRetrievalClient::new(auth)?;
    if let Some(endpoint) = &aws.agent_runtime_endpoint {
        client = client.with_endpoint(endpoint);
    }
    Ok(Arc::new(client))
}
