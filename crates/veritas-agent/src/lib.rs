pub mod analyzer;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod reporter;
pub mod searcher;
pub mod state;

pub use analyzer::LlmTrustAnalyzer;
pub use pipeline::{
    build_research_graph, collection_name, research_graph_outline, run_research, PipelineSettings,
    ResearchCollaborators,
};
pub use report::HtmlReportRenderer;
pub use reporter::LlmReportWriter;
pub use searcher::LlmQueryGenerator;
pub use state::{ResearchState, ResearchUpdate};
