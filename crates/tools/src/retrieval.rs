//! Bedrock Knowledge Bases retrieval client.
//!
//! Calls the `Retrieve` operation of the agent runtime: vector search over a
//! knowledge base, returning ranked text snippets. Ranking happens remotely;
//! this client only forwards the query and decodes the results.

use async_trait::async_trait;
use chatrelay_aws::{AwsAuth, uri_encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SERVICE: &str = "bedrock";

/// A retrieval request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalQuery {
    pub text: String,
    pub number_of_results: u32,
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedSnippet {
    pub text: String,

    /// Relevance score reported by the knowledge base
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Where the passage came from (e.g. an S3 URI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("no credentials available for knowledge-base retrieval")]
    NotConfigured,

    #[error("{0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("retrieve returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Anything that can search a knowledge base.
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        region: &str,
        query: &RetrievalQuery,
    ) -> Result<Vec<RetrievedSnippet>, RetrievalError>;
}

/// `Retrieve` over HTTPS.
pub struct BedrockRetrievalClient {
    auth: Option<AwsAuth>,
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl BedrockRetrievalClient {
    pub fn new(auth: Option<AwsAuth>) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        Ok(Self {
            auth,
            endpoint: None,
            client,
        })
    }

    /// Use a fixed endpoint instead of the regional one.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    fn url(&self, knowledge_base_id: &str, region: &str) -> Result<reqwest::Url, RetrievalError> {
        let base = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-agent-runtime.{region}.amazonaws.com"));
        let url = format!("{base}/knowledgebases/{}/retrieve", uri_encode(knowledge_base_id, true));
        reqwest::Url::parse(&url).map_err(|e| RetrievalError::Http(format!("{url}: {e}")))
    }
}

/// The `Retrieve` request body.
pub fn retrieve_body(query: &RetrievalQuery) -> serde_json::Value {
    serde_json::json!({
        "retrievalQuery": { "text": query.text },
        "retrievalConfiguration": {
            "vectorSearchConfiguration": { "numberOfResults": query.number_of_results }
        }
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Deserialize)]
struct RetrievalResult {
    #[serde(default)]
    content: Option<RetrievalContent>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    location: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RetrievalContent {
    #[serde(default)]
    text: Option<String>,
}

/// Decode a `Retrieve` response, dropping results without text.
pub fn parse_retrieve_response(body: &[u8]) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
    let response: RetrieveResponse =
        serde_json::from_slice(body).map_err(|e| RetrievalError::Decode(e.to_string()))?;

    Ok(response
        .retrieval_results
        .into_iter()
        .filter_map(|r| {
            let text = r.content.and_then(|c| c.text).filter(|t| !t.is_empty())?;
            Some(RetrievedSnippet {
                text,
                score: r.score,
                location: r.location.as_ref().and_then(location_uri),
            })
        })
        .collect())
}

/// Pull a human-readable URI out of a result location, whatever its type.
fn location_uri(location: &serde_json::Value) -> Option<String> {
    location
        .as_object()?
        .values()
        .find_map(|v| v.get("uri").or_else(|| v.get("url")))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[async_trait]
impl RetrievalClient for BedrockRetrievalClient {
    async fn retrieve(
        &self,
        knowledge_base_id: &str,
        region: &str,
        query: &RetrievalQuery,
    ) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        let auth = self.auth.as_ref().ok_or(RetrievalError::NotConfigured)?;
        let url = self.url(knowledge_base_id, region)?;
        let body = serde_json::to_vec(&retrieve_body(query))
            .map_err(|e| RetrievalError::Decode(e.to_string()))?;

        debug!(knowledge_base = %knowledge_base_id, %region, "Retrieving from knowledge base");

        let response = chatrelay_aws::authorized_request(
            &self.client,
            reqwest::Method::POST,
            url,
            body,
            auth,
            region,
            SERVICE,
        )
        .map_err(|e| RetrievalError::Auth(e.to_string()))?
        .header("content-type", "application/json")
        .send()
        .await
        .map_err(|e| RetrievalError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;
        if status != 200 {
            return Err(RetrievalError::Status {
                status,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        parse_retrieve_response(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_regional_and_encoded() {
        let client = BedrockRetrievalClient::new(None).unwrap();
        assert_eq!(
            client.url("P7J0PZOXSE", "us-east-1").unwrap().as_str(),
            "https://bedrock-agent-runtime.us-east-1.amazonaws.com/knowledgebases/P7J0PZOXSE/retrieve"
        );

        let client = client.with_endpoint("http://localhost:9001/");
        assert_eq!(
            client.url("KB", "eu-west-1").unwrap().as_str(),
            "http://localhost:9001/knowledgebases/KB/retrieve"
        );
    }

    #[test]
    fn body_shape() {
        let body = retrieve_body(&RetrievalQuery {
            text: "rate hikes".into(),
            number_of_results: 5,
        });
        assert_eq!(body["retrievalQuery"]["text"], "rate hikes");
        assert_eq!(
            body["retrievalConfiguration"]["vectorSearchConfiguration"]["numberOfResults"],
            5
        );
    }

    #[test]
    fn parse_response() {
        let body = br#"{
            "retrievalResults": [
                {"content": {"text": "The Committee raised rates."}, "score": 0.82,
                 "location": {"type": "S3", "s3Location": {"uri": "s3://docs/minutes.pdf"}}},
                {"content": {"text": ""}, "score": 0.9},
                {"content": {"text": "Inflation remains elevated."}}
            ]
        }"#;
        let snippets = parse_retrieve_response(body).unwrap();
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].score, Some(0.82));
        assert_eq!(snippets[0].location.as_deref(), Some("s3://docs/minutes.pdf"));
        assert_eq!(snippets[1].text, "Inflation remains elevated.");
        assert!(snippets[1].score.is_none());
    }

    #[test]
    fn parse_empty_and_garbage() {
        assert!(parse_retrieve_response(b"{}").unwrap().is_empty());
        assert!(matches!(
            parse_retrieve_response(b"<html>"),
            Err(RetrievalError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn retrieve_without_credentials_fails() {
        let client = BedrockRetrievalClient::new(None).unwrap();
        let query = RetrievalQuery {
            text: "q".into(),
            number_of_results: 5,
        };
        let err = client.retrieve("KB", "us-east-1", &query).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NotConfigured));
    }
}
