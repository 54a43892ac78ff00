use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use veritas_core::config::ModelConfig;
use veritas_core::error::Result;
use veritas_core::traits::{LlmClient, QueryGenerator};
use veritas_core::types::ChatMessage;

use crate::prompts::{query_generation_prompt, RESEARCH_SYSTEM_PROMPT, TEMPERATURE_CREATIVE};

/// Generates search queries by asking an LLM for one query per line.
pub struct LlmQueryGenerator {
    llm: Arc<dyn LlmClient>,
    config: ModelConfig,
    max_queries: usize,
}

impl LlmQueryGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, config: &ModelConfig, max_queries: usize) -> Self {
        Self {
            llm,
            config: config.with_temperature(TEMPERATURE_CREATIVE),
            max_queries: max_queries.max(1),
        }
    }
}

/// Pull queries out of a line-per-query response.
///
/// List markers are stripped, blank lines and markdown headings skipped.
pub fn parse_queries(text: &str, max_queries: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.trim_start_matches(|c: char| c.is_ascii_digit() || ".-)* ".contains(c))
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|q| !q.is_empty())
        .take(max_queries)
        .collect()
}

impl QueryGenerator for LlmQueryGenerator {
    fn generate(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        let topic = topic.to_string();
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
                ChatMessage::user(query_generation_prompt(&topic)),
            ];

            let text = match self.llm.complete(&self.config, messages).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Query generation failed, using topic");
                    return Ok(vec![topic]);
                }
            };

            let queries = parse_queries(&text, self.max_queries);
            if queries.is_empty() {
                warn!(topic = %topic, "No queries in response, using topic");
                return Ok(vec![topic]);
            }
            debug!(count = queries.len(), "Generated search queries");
            Ok(queries)
        })
    }
}
