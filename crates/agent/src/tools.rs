//! Tool selection: which tools an agent gets, decided by personality alone.

use std::sync::Arc;

use chatrelay_config::{KnowledgeBaseConfig, KnowledgeBasesConfig};
use chatrelay_core::tool::ToolRegistry;
use chatrelay_tools::{KnowledgeBaseSearchTool, RetrievalClient};

use crate::persona::Personality;

/// Build the tool set for a personality key.
///
/// Exactly `fomc` and `scotus` get their knowledge-base search tool; every
/// other key, custom prompts included, gets no tools.
pub fn select_tools(
    personality: &str,
    knowledge_bases: &KnowledgeBasesConfig,
    default_region: &str,
    client: Arc<dyn RetrievalClient>,
) -> ToolRegistry {
    let region = |kb: &KnowledgeBaseConfig| kb.region.clone().unwrap_or_else(|| default_region.to_string());

    let mut registry = ToolRegistry::new();
    let tool = match Personality::from_key(personality) {
        Some(Personality::Fomc) => {
            let kb = &knowledge_bases.fomc;
            KnowledgeBaseSearchTool::fomc(&kb.id, region(kb), client)
        }
        Some(Personality::Scotus) => {
            let kb = &knowledge_bases.scotus;
            KnowledgeBaseSearchTool::scotus(&kb.id, region(kb), client)
        }
        _ => return registry,
    };

    registry.register(Box::new(
        tool.with_defaults(knowledge_bases.number_of_results, knowledge_bases.min_score),
    ));
    registry
}
