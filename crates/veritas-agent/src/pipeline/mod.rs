//! The research pipeline as a compiled state graph.
//!
//! ```text
//! query_gen -> search -> scraper -> analyzer -> storage -> report -> END
//!                                          \______________/
//! ```
//!
//! After analysis the graph branches on [`routing::should_store_sources`]: storage
//! runs only when at least one source cleared the trust threshold.

pub mod nodes;
pub mod routing;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use veritas_core::config::AppConfig;
use veritas_core::error::Result;
use veritas_core::traits::{
    QueryGenerator, ReportRenderer, ReportWriter, Scraper, TrustAnalyzer, VectorStore, WebSearch,
};
use veritas_core::types::{ScrapeOptions, DEFAULT_TRUST_THRESHOLD};
use veritas_graph::{
    CompiledGraph, ExecutionResult, FnNode, NodeOutput, StateGraph, DEFAULT_RECURSION_LIMIT, END,
};

use crate::state::{ResearchState, ResearchUpdate};
use nodes::{AnalyzerNode, QueryGenNode, ReportNode, ScraperNode, SearchNode, StorageNode};
use routing::{should_store_sources, StoreDecision};

/// Topic characters kept in a collection name.
const COLLECTION_SLUG_CHARS: usize = 30;

/// External services the pipeline nodes call.
#[derive(Clone)]
pub struct ResearchCollaborators {
    pub query_generator: Arc<dyn QueryGenerator>,
    pub search: Arc<dyn WebSearch>,
    pub scraper: Arc<dyn Scraper>,
    pub analyzer: Arc<dyn TrustAnalyzer>,
    pub writer: Arc<dyn ReportWriter>,
    pub renderer: Arc<dyn ReportRenderer>,
    pub store: Arc<dyn VectorStore>,
}

/// Knobs fixed at graph construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub trust_threshold: f64,
    pub collection_prefix: String,
    pub scrape: ScrapeOptions,
    /// When false the analyzer always routes straight to the report.
    pub store_sources: bool,
    pub recursion_limit: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            trust_threshold: DEFAULT_TRUST_THRESHOLD,
            collection_prefix: "research".to_string(),
            scrape: ScrapeOptions::default(),
            store_sources: true,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            trust_threshold: config.research.trust_threshold,
            collection_prefix: config.vector_store.collection_prefix.clone(),
            scrape: ScrapeOptions {
                timeout: Duration::from_secs(config.scraper.timeout_secs),
                max_retries: config.scraper.max_retries,
            },
            ..Self::default()
        }
    }
}

/// Wire the six research nodes into a compiled graph.
pub fn build_research_graph(
    collaborators: &ResearchCollaborators,
    settings: &PipelineSettings,
) -> Result<CompiledGraph<ResearchState>> {
    let mut graph = StateGraph::new();
    graph
        .add_node(QueryGenNode::new(collaborators.query_generator.clone()))?
        .add_node(SearchNode::new(collaborators.search.clone()))?
        .add_node(ScraperNode::new(
            collaborators.scraper.clone(),
            settings.scrape,
        ))?
        .add_node(AnalyzerNode::new(collaborators.analyzer.clone()))?
        .add_node(StorageNode::new(
            collaborators.store.clone(),
            settings.trust_threshold,
            &settings.collection_prefix,
        ))?
        .add_node(ReportNode::new(
            collaborators.writer.clone(),
            collaborators.renderer.clone(),
        ))?;

    wire(graph, settings)
}

/// The pipeline's wiring with placeholder nodes, for rendering the graph
/// without building any collaborators.
pub fn research_graph_outline(
    settings: &PipelineSettings,
) -> Result<CompiledGraph<ResearchState>> {
    let placeholder: fn(&ResearchState) -> NodeOutput<ResearchUpdate> =
        |_| Ok(ResearchUpdate::default());
    let mut graph = StateGraph::new();
    for name in nodes::PIPELINE_ORDER {
        graph.add_node(FnNode::new(name, placeholder))?;
    }
    wire(graph, settings)
}

fn wire(
    mut graph: StateGraph<ResearchState>,
    settings: &PipelineSettings,
) -> Result<CompiledGraph<ResearchState>> {
    let should_store = should_store_sources(settings.trust_threshold);
    let store_sources = settings.store_sources;
    graph
        .set_entry_point(nodes::QUERY_GEN)?
        .add_edge(nodes::QUERY_GEN, nodes::SEARCH)?
        .add_edge(nodes::SEARCH, nodes::SCRAPER)?
        .add_edge(nodes::SCRAPER, nodes::ANALYZER)?
        .add_conditional_edges(
            nodes::ANALYZER,
            move |state: &ResearchState| {
                if store_sources {
                    should_store(state)
                } else {
                    StoreDecision::Report
                }
            },
            [
                (StoreDecision::Storage, nodes::STORAGE),
                (StoreDecision::Report, nodes::REPORT),
            ],
        )?
        .add_edge(nodes::STORAGE, nodes::REPORT)?
        .add_edge(nodes::REPORT, END)?;

    Ok(graph.compile()?.with_recursion_limit(settings.recursion_limit))
}

/// Run the pipeline for `topic` and return the per-node record.
pub async fn run_research(
    graph: &CompiledGraph<ResearchState>,
    topic: &str,
    max_sources: usize,
) -> Result<ExecutionResult<ResearchState>> {
    info!(topic, max_sources, "Starting research");
    graph.run(ResearchState::new(topic, max_sources)).await
}

/// Vector store collection for a topic: `{prefix}_{slug}`.
pub fn collection_name(prefix: &str, topic: &str) -> String {
    let slug: String = topic
        .chars()
        .take(COLLECTION_SLUG_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", prefix, slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_test_utils::*;

    fn collaborators(
        search: StaticSearch,
        scraper: StaticScraper,
        analyzer: ScoreTableAnalyzer,
        store: Arc<InMemoryVectorStore>,
    ) -> ResearchCollaborators {
        ResearchCollaborators {
            query_generator: Arc::new(StaticQueryGenerator::new(&["q1", "q2"])),
            search: Arc::new(search),
            scraper: Arc::new(scraper),
            analyzer: Arc::new(analyzer),
            writer: Arc::new(StaticReportWriter::default()),
            renderer: Arc::new(crate::HtmlReportRenderer::default()),
            store,
        }
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(
            collection_name("research", "Quantum Computing: basics"),
            "research_quantum_computing__basics"
        );
        let long = "a".repeat(60);
        assert_eq!(collection_name("p", &long), format!("p_{}", "a".repeat(30)));
        assert_eq!(collection_name("research", "Café"), "research_caf_");
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AppConfig::default();
        config.research.trust_threshold = 70.0;
        config.scraper.timeout_secs = 4;
        config.vector_store.collection_prefix = "kb".into();
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.trust_threshold, 70.0);
        assert_eq!(settings.scrape.timeout, Duration::from_secs(4));
        assert_eq!(settings.collection_prefix, "kb");
        assert!(settings.store_sources);
    }

    #[test]
    fn test_graph_shape() {
        let graph = build_research_graph(
            &collaborators(
                StaticSearch::new(),
                StaticScraper::new(),
                ScoreTableAnalyzer::new(90.0),
                Arc::new(InMemoryVectorStore::new()),
            ),
            &PipelineSettings::default(),
        )
        .unwrap();
        assert_eq!(graph.entry(), "query_gen");
        assert_eq!(
            graph.node_names(),
            vec!["query_gen", "search", "scraper", "analyzer", "storage", "report"]
        );
        let diagram = graph.describe();
        assert!(diagram.contains("analyzer -. storage .-> storage"));
        assert!(diagram.contains("analyzer -. report .-> report"));
        assert!(diagram.contains("report --> __end__([end])"));
    }

    #[test]
    fn test_outline_matches_built_graph() {
        let settings = PipelineSettings::default();
        let outline = research_graph_outline(&settings).unwrap();
        let built = build_research_graph(
            &collaborators(
                StaticSearch::new(),
                StaticScraper::new(),
                ScoreTableAnalyzer::new(90.0),
                Arc::new(InMemoryVectorStore::new()),
            ),
            &settings,
        )
        .unwrap();
        assert_eq!(outline.entry(), built.entry());
        assert_eq!(outline.node_names(), built.node_names());
        assert_eq!(outline.describe(), built.describe());
        assert!(outline.describe().contains("analyzer -. storage .-> storage"));
    }

    #[tokio::test]
    async fn test_trustworthy_run_visits_storage() {
        let store = Arc::new(InMemoryVectorStore::new());
        let graph = build_research_graph(
            &collaborators(
                StaticSearch::new()
                    .with_results("q1", &["https://a", "https://b"])
                    .with_results("q2", &["https://c"]),
                StaticScraper::new(),
                ScoreTableAnalyzer::new(40.0).with_score("https://a", 95.0),
                store.clone(),
            ),
            &PipelineSettings::default(),
        )
        .unwrap();

        let result = run_research(&graph, "solar power", 6).await.unwrap();
        assert_eq!(
            result.path(),
            vec!["query_gen", "search", "scraper", "analyzer", "storage", "report"]
        );
        assert!(result.succeeded);
        let state = result.state;
        assert_eq!(state.current_step, "report_complete");
        assert_eq!(state.stored_sources.len(), 1);
        assert_eq!(state.rejected_sources.len(), 2);
        assert_eq!(store.stored("research_solar_power").len(), 1);
        assert!(state.errors.is_empty());
    }

    #[tokio::test]
    async fn test_no_store_setting_skips_storage() {
        let store = Arc::new(InMemoryVectorStore::new());
        let settings = PipelineSettings {
            store_sources: false,
            ..PipelineSettings::default()
        };
        let graph = build_research_graph(
            &collaborators(
                StaticSearch::new().with_results("q1", &["https://a"]),
                StaticScraper::new(),
                ScoreTableAnalyzer::new(99.0),
                store.clone(),
            ),
            &settings,
        )
        .unwrap();

        let result = run_research(&graph, "solar power", 4).await.unwrap();
        assert!(!result.path().contains(&"storage"));
        assert!(result.state.stored_sources.is_empty());
        assert!(store.add_calls().is_empty());
        assert_eq!(result.state.current_step, "report_complete");
    }

    #[tokio::test]
    async fn test_empty_search_reaches_report_with_errors() {
        let graph = build_research_graph(
            &collaborators(
                StaticSearch::new(),
                StaticScraper::new(),
                ScoreTableAnalyzer::new(90.0),
                Arc::new(InMemoryVectorStore::new()),
            ),
            &PipelineSettings::default(),
        )
        .unwrap();

        let result = run_research(&graph, "nothing to find", 5).await.unwrap();
        assert_eq!(
            result.path(),
            vec!["query_gen", "search", "scraper", "analyzer", "report"]
        );
        assert!(!result.succeeded);
        let state = result.state;
        assert_eq!(state.current_step, "report_generated_with_errors");
        assert_eq!(state.errors, vec!["No URLs to scrape", "No sources to analyze"]);
        assert!(state.report_html.contains("No sources were successfully analyzed."));
    }
}
