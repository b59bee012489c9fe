//! Model provider implementations for chatrelay.
//!
//! All providers implement the `chatrelay_core::Provider` trait.
//! Bedrock's Converse API is the only backend: every model family the agent
//! offers (Amazon Nova, Anthropic Claude) is reached through it.

pub mod bedrock;

pub use bedrock::BedrockProvider;

use std::sync::Arc;

use chatrelay_aws::{AwsAuth, Credentials};
use chatrelay_core::Provider;
use chatrelay_core::error::ProviderError;

/// Build the provider described by configuration.
///
/// A Bedrock API key wins over access keys. Fails with `NotConfigured` when
/// neither is available.
pub fn build_from_config(
    config: &chatrelay_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let aws = &config.aws;
    let credentials = Credentials::from_parts(
        aws.access_key_id.as_deref(),
        aws.secret_access_key.as_deref(),
        aws.session_token.as_deref(),
    );
    let auth = AwsAuth::for_bedrock(aws.bearer_token.as_deref(), credentials).ok_or_else(|| {
        ProviderError::NotConfigured(
            "no Bedrock credentials: set AWS_BEARER_TOKEN_BEDROCK or AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY".into(),
        )
    })?;

    let mut provider = BedrockProvider::new(&aws.region, auth)?;
    if let Some(endpoint) = &aws.bedrock_endpoint {
        provider = provider.with_endpoint(endpoint);
    }
    Ok(Arc::new(provider))
}
