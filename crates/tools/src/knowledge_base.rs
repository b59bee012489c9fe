//! Knowledge-base search tools.
//!
//! Each tool is bound to one knowledge base (id and region) at construction.
//! The model only ever supplies the query text and, optionally, how many
//! results to fetch and how relevant they must be; it cannot point a tool at
//! a different knowledge base.

use std::sync::Arc;

use async_trait::async_trait;
use chatrelay_core::error::ToolError;
use chatrelay_core::tool::{Tool, ToolResult};
use tracing::{debug, warn};

use crate::retrieval::{RetrievalClient, RetrievalQuery};

const DEFAULT_NUMBER_OF_RESULTS: u32 = 5;
const DEFAULT_MIN_SCORE: f64 = 0.4;
const MAX_NUMBER_OF_RESULTS: u32 = 100;

/// A pre-bound knowledge base.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    /// Short label used in tool output (e.g. "FOMC")
    pub label: String,
    pub knowledge_base_id: String,
    pub region: String,
}

impl KnowledgeBase {
    pub fn new(label: impl Into<String>, knowledge_base_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            knowledge_base_id: knowledge_base_id.into(),
            region: region.into(),
        }
    }
}

/// Searches one knowledge base and returns the matching passages as text.
pub struct KnowledgeBaseSearchTool {
    name: String,
    description: String,
    knowledge_base: KnowledgeBase,
    client: Arc<dyn RetrievalClient>,
    default_number_of_results: u32,
    default_min_score: f64,
}

impl KnowledgeBaseSearchTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        knowledge_base: KnowledgeBase,
        client: Arc<dyn RetrievalClient>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            knowledge_base,
            client,
            default_number_of_results: DEFAULT_NUMBER_OF_RESULTS,
            default_min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Federal Open Market Committee documents.
    pub fn fomc(knowledge_base_id: impl Into<String>, region: impl Into<String>, client: Arc<dyn RetrievalClient>) -> Self {
        Self::new(
            "fomc_kb_search",
            "Search the FOMC knowledge base for information about Federal Reserve monetary policy, \
             meeting minutes, and economic decisions.",
            KnowledgeBase::new("FOMC", knowledge_base_id, region),
            client,
        )
    }

    /// Supreme Court of the United States opinions.
    pub fn scotus(knowledge_base_id: impl Into<String>, region: impl Into<String>, client: Arc<dyn RetrievalClient>) -> Self {
        Self::new(
            "scotus_kb_search",
            "Search the SCOTUS knowledge base for information about Supreme Court cases, \
             opinions, and legal precedents.",
            KnowledgeBase::new("SCOTUS", knowledge_base_id, region),
            client,
        )
    }

    /// Override the defaults used when the model omits the optional parameters.
    pub fn with_defaults(mut self, number_of_results: u32, min_score: f64) -> Self {
        self.default_number_of_results = number_of_results.clamp(1, MAX_NUMBER_OF_RESULTS);
        self.default_min_score = min_score;
        self
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }
}

#[async_trait]
impl Tool for KnowledgeBaseSearchTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let label = &self.knowledge_base.label;
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": format!("The search query to find relevant {label} information")
                },
                "number_of_results": {
                    "type": "integer",
                    "description": format!("Maximum number of passages to return (default {})", self.default_number_of_results),
                    "minimum": 1,
                    "maximum": MAX_NUMBER_OF_RESULTS
                },
                "min_score": {
                    "type": "number",
                    "description": format!("Minimum relevance score between 0 and 1 (default {})", self.default_min_score)
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let number_of_results = arguments["number_of_results"]
            .as_u64()
            .map(|n| n.clamp(1, MAX_NUMBER_OF_RESULTS as u64) as u32)
            .unwrap_or(self.default_number_of_results);
        let min_score = arguments["min_score"]
            .as_f64()
            .unwrap_or(self.default_min_score);

        let kb = &self.knowledge_base;
        debug!(tool = %self.name, knowledge_base = %kb.knowledge_base_id, number_of_results, "Searching knowledge base");

        let request = RetrievalQuery {
            text: query.to_string(),
            number_of_results,
        };
        let snippets = match self
            .client
            .retrieve(&kb.knowledge_base_id, &kb.region, &request)
            .await
        {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Knowledge base search failed");
                return Ok(ToolResult::failed(format!(
                    "Error searching {} knowledge base: {e}",
                    kb.label
                )));
            }
        };

        // Unscored passages are kept; the threshold only applies to scored ones.
        let passages: Vec<String> = snippets
            .into_iter()
            .filter(|s| s.score.is_none_or(|score| score >= min_score))
            .map(|s| s.text)
            .collect();

        if passages.is_empty() {
            return Ok(ToolResult::ok(format!(
                "No relevant {} information found for your query.",
                kb.label
            )));
        }

        Ok(ToolResult::ok(passages.join("\n\n")))
    }
}
