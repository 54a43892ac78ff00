use std::collections::HashSet;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{info, warn};

use veritas_core::traits::{
    QueryGenerator, ReportRenderer, ReportWriter, Scraper, TrustAnalyzer, VectorStore, WebSearch,
};
use veritas_core::types::{ScrapeOptions, TrustAssessment};
use veritas_graph::{Node, NodeFailure, NodeOutput};

use crate::report::{empty_report_html, error_report_html};
use crate::state::{ResearchState, ResearchUpdate};

use super::collection_name;

pub const QUERY_GEN: &str = "query_gen";
pub const SEARCH: &str = "search";
pub const SCRAPER: &str = "scraper";
pub const ANALYZER: &str = "analyzer";
pub const STORAGE: &str = "storage";
pub const REPORT: &str = "report";

/// Node names in registration order.
pub const PIPELINE_ORDER: [&str; 6] = [QUERY_GEN, SEARCH, SCRAPER, ANALYZER, STORAGE, REPORT];

/// Metadata key recording why a source got the neutral score.
pub const ANALYSIS_ERROR_KEY: &str = "analysis_error";

fn dedupe(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Turns the topic into search queries.
pub struct QueryGenNode {
    generator: Arc<dyn QueryGenerator>,
}

impl QueryGenNode {
    pub fn new(generator: Arc<dyn QueryGenerator>) -> Self {
        Self { generator }
    }
}

impl Node<ResearchState> for QueryGenNode {
    fn name(&self) -> &str {
        QUERY_GEN
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            match self.generator.generate(&state.topic).await {
                Ok(queries) => {
                    let queries = if queries.is_empty() {
                        vec![state.topic.clone()]
                    } else {
                        queries
                    };
                    info!(count = queries.len(), "Search queries generated");
                    Ok(ResearchUpdate {
                        search_queries: Some(queries),
                        ..ResearchUpdate::step("query_generation_complete")
                    })
                }
                Err(e) => Err(NodeFailure::new(
                    "query_generation_failed",
                    format!("Query generation failed: {}", e),
                )
                .with_update(ResearchUpdate {
                    search_queries: Some(vec![state.topic.clone()]),
                    ..Default::default()
                })),
            }
        })
    }
}

/// Runs every query and collects unique URLs.
pub struct SearchNode {
    search: Arc<dyn WebSearch>,
}

impl SearchNode {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

impl Node<ResearchState> for SearchNode {
    fn name(&self) -> &str {
        SEARCH
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            let queries = if state.search_queries.is_empty() {
                vec![state.topic.clone()]
            } else {
                state.search_queries.clone()
            };
            let per_query = (state.max_sources / queries.len()).max(1);

            let mut urls = Vec::new();
            let mut last_error = None;
            let mut failures = 0;
            for query in &queries {
                match self.search.search(query, per_query).await {
                    Ok(hits) => urls.extend(hits.into_iter().map(|h| h.url)),
                    Err(e) => {
                        warn!(provider = self.search.name(), query = %query, error = %e, "Search query failed");
                        failures += 1;
                        last_error = Some(e);
                    }
                }
            }

            if failures == queries.len() {
                let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
                return Err(NodeFailure::new(
                    "search_failed",
                    format!("Search failed: {}", reason),
                ));
            }

            let mut urls = dedupe(urls);
            urls.truncate(state.max_sources);
            info!(queries = queries.len(), urls = urls.len(), "Search complete");
            Ok(ResearchUpdate {
                discovered_urls: urls,
                ..ResearchUpdate::step("search_complete")
            })
        })
    }
}

/// Fetches every discovered URL.
pub struct ScraperNode {
    scraper: Arc<dyn Scraper>,
    options: ScrapeOptions,
}

impl ScraperNode {
    pub fn new(scraper: Arc<dyn Scraper>, options: ScrapeOptions) -> Self {
        Self { scraper, options }
    }
}

impl Node<ResearchState> for ScraperNode {
    fn name(&self) -> &str {
        SCRAPER
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            if state.discovered_urls.is_empty() {
                return Err(NodeFailure::new(
                    "scraping_skipped_no_urls",
                    "No URLs to scrape",
                ));
            }

            let mut sources = Vec::new();
            let mut failed = Vec::new();
            for url in dedupe(state.discovered_urls.iter().cloned()) {
                match self.scraper.scrape(&url, self.options).await {
                    Ok(source) => sources.push(source),
                    Err(e) => {
                        warn!(url = %url, error = %e, "Failed to scrape");
                        failed.push(url);
                    }
                }
            }

            info!(scraped = sources.len(), failed = failed.len(), "Scraping complete");
            Ok(ResearchUpdate {
                scraped_sources: sources,
                failed_urls: failed,
                ..ResearchUpdate::step("scraping_complete")
            })
        })
    }
}

/// Scores every scraped source.
pub struct AnalyzerNode {
    analyzer: Arc<dyn TrustAnalyzer>,
}

impl AnalyzerNode {
    pub fn new(analyzer: Arc<dyn TrustAnalyzer>) -> Self {
        Self { analyzer }
    }
}

impl Node<ResearchState> for AnalyzerNode {
    fn name(&self) -> &str {
        ANALYZER
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            if state.scraped_sources.is_empty() {
                return Err(NodeFailure::new(
                    "analysis_skipped_no_sources",
                    "No sources to analyze",
                ));
            }

            let total = state.scraped_sources.len();
            let mut analyzed = Vec::with_capacity(total);
            let mut last_error = None;
            let mut failures = 0;
            for (i, source) in state.scraped_sources.iter().enumerate() {
                let mut source = source.clone();
                match self.analyzer.analyze(&source, &state.topic).await {
                    Ok(assessment) => {
                        info!(progress = %format!("{}/{}", i + 1, total), url = %source.url, score = assessment.score, "Source scored");
                        source.apply_assessment(&assessment);
                    }
                    Err(e) => {
                        warn!(url = %source.url, error = %e, "Analysis failed, assigning neutral score");
                        source.apply_assessment(&TrustAssessment::neutral(
                            "Analysis failed - assigned default score",
                        ));
                        source
                            .metadata
                            .insert(ANALYSIS_ERROR_KEY.to_string(), json!(e.to_string()));
                        failures += 1;
                        last_error = Some(e);
                    }
                }
                analyzed.push(source);
            }

            if failures == total {
                let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
                return Err(NodeFailure::new(
                    "analysis_failed",
                    format!("Analysis failed: {}", reason),
                )
                .with_update(ResearchUpdate {
                    analyzed_sources: analyzed,
                    ..Default::default()
                }));
            }

            Ok(ResearchUpdate {
                analyzed_sources: analyzed,
                ..ResearchUpdate::step("analysis_complete")
            })
        })
    }
}

/// Persists trustworthy sources to the vector store.
pub struct StorageNode {
    store: Arc<dyn VectorStore>,
    threshold: f64,
    collection_prefix: String,
}

impl StorageNode {
    pub fn new(store: Arc<dyn VectorStore>, threshold: f64, collection_prefix: &str) -> Self {
        Self {
            store,
            threshold,
            collection_prefix: collection_prefix.to_string(),
        }
    }
}

impl Node<ResearchState> for StorageNode {
    fn name(&self) -> &str {
        STORAGE
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            if state.analyzed_sources.is_empty() {
                return Ok(ResearchUpdate::step("storage_skipped_no_sources"));
            }

            let (trustworthy, rejected): (Vec<_>, Vec<_>) = state
                .analyzed_sources
                .iter()
                .cloned()
                .partition(|s| s.is_trustworthy(self.threshold));

            if trustworthy.is_empty() {
                return Ok(ResearchUpdate {
                    rejected_sources: rejected,
                    ..ResearchUpdate::step("storage_skipped_no_trustworthy_sources")
                });
            }

            let collection = collection_name(&self.collection_prefix, &state.topic);
            match self.store.add(&collection, &trustworthy).await {
                Ok(()) => {
                    info!(collection = %collection, stored = trustworthy.len(), rejected = rejected.len(), "Sources stored");
                    Ok(ResearchUpdate {
                        stored_sources: trustworthy,
                        rejected_sources: rejected,
                        ..ResearchUpdate::step("storage_complete")
                    })
                }
                Err(e) => Err(NodeFailure::new("storage_failed", format!("Storage failed: {}", e))
                    .with_update(ResearchUpdate {
                        rejected_sources: state.analyzed_sources.clone(),
                        ..Default::default()
                    })),
            }
        })
    }
}

/// Writes and renders the final report.
pub struct ReportNode {
    writer: Arc<dyn ReportWriter>,
    renderer: Arc<dyn ReportRenderer>,
}

impl ReportNode {
    pub fn new(writer: Arc<dyn ReportWriter>, renderer: Arc<dyn ReportRenderer>) -> Self {
        Self { writer, renderer }
    }
}

impl Node<ResearchState> for ReportNode {
    fn name(&self) -> &str {
        REPORT
    }

    fn run<'a>(&'a self, state: &'a ResearchState) -> BoxFuture<'a, NodeOutput<ResearchUpdate>> {
        Box::pin(async move {
            if state.analyzed_sources.is_empty() {
                return Ok(ResearchUpdate {
                    report_html: Some(empty_report_html(&state.topic, &state.errors)),
                    ..ResearchUpdate::step("report_generated_with_errors")
                });
            }

            let narrative = self
                .writer
                .write(&state.topic, &state.analyzed_sources)
                .await;
            match self
                .renderer
                .render(&state.topic, &state.analyzed_sources, &narrative)
            {
                Ok(html) => {
                    info!(bytes = html.len(), "Report rendered");
                    Ok(ResearchUpdate {
                        report_html: Some(html),
                        ..ResearchUpdate::step("report_complete")
                    })
                }
                Err(e) => {
                    let message = format!("Report generation failed: {}", e);
                    Err(NodeFailure::new("report_failed", message.clone()).with_update(
                        ResearchUpdate {
                            report_html: Some(error_report_html(&state.topic, &message)),
                            ..Default::default()
                        },
                    ))
                }
            }
        })
    }
}
