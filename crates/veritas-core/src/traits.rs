use futures::future::BoxFuture;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// LLM client for single-shot chat completion.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and return the assistant's text.
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>>;
}

/// Turns a research topic into search queries.
pub trait QueryGenerator: Send + Sync + 'static {
    /// Implementations fall back to `[topic]` rather than failing on bad model output.
    fn generate(&self, topic: &str) -> BoxFuture<'_, Result<Vec<String>>>;
}

/// Web search provider.
pub trait WebSearch: Send + Sync + 'static {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Search a single query. Provider errors surface as `VeritasError::Search`.
    fn search(&self, query: &str, max_results: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>>;
}

/// Fetches a URL and extracts its readable text.
pub trait Scraper: Send + Sync + 'static {
    fn scrape(&self, url: &str, options: ScrapeOptions) -> BoxFuture<'_, Result<Source>>;
}

/// Scores a source's trustworthiness for a topic.
pub trait TrustAnalyzer: Send + Sync + 'static {
    fn analyze(&self, source: &Source, topic: &str) -> BoxFuture<'_, Result<TrustAssessment>>;
}

/// Writes the prose parts of a report.
pub trait ReportWriter: Send + Sync + 'static {
    fn write(&self, topic: &str, sources: &[Source]) -> BoxFuture<'_, ReportNarrative>;
}

/// Renders the final report document. Pure, no I/O.
pub trait ReportRenderer: Send + Sync + 'static {
    fn render(&self, topic: &str, sources: &[Source], narrative: &ReportNarrative)
        -> Result<String>;
}

/// Persistent similarity index over sources, partitioned by collection.
pub trait VectorStore: Send + Sync + 'static {
    /// Insert or replace sources. Identity is the source URL.
    fn add(&self, collection: &str, sources: &[Source]) -> BoxFuture<'_, Result<()>>;

    /// Sources ranked by similarity to `text`, best first.
    fn query_similar(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SimilarSource>>>;

    fn get_by_url(&self, collection: &str, url: &str) -> BoxFuture<'_, Result<Option<Source>>>;
}
