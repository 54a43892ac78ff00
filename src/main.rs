use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use veritas_core::config::AppConfig;
use veritas_core::traits::LlmClient;

use veritas_agent::{
    build_research_graph, collection_name, research_graph_outline, run_research,
    HtmlReportRenderer, LlmQueryGenerator, LlmReportWriter, LlmTrustAnalyzer, PipelineSettings,
    ResearchCollaborators, ResearchState,
};
use veritas_graph::ExecutionResult;
use veritas_memory::SqliteVectorStore;
use veritas_tools::{create_search_provider, HttpScraper};

const DEFAULT_CONFIG: &str = "veritas.toml";

#[derive(Parser)]
#[command(name = "veritas", version, about = "Research pipeline that scores and keeps trustworthy sources")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a topic and write an HTML report
    Research {
        /// The topic to research
        #[arg(trailing_var_arg = true, required = true)]
        topic: Vec<String>,
        /// Maximum number of sources to scrape (defaults to research.max_sources)
        #[arg(long)]
        max_sources: Option<usize>,
        /// Report path (defaults to a timestamped file in research.reports_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Never write sources to the vector store
        #[arg(long)]
        no_store: bool,
    },
    /// Print the pipeline graph as a Mermaid diagram
    Graph,
    /// Show current configuration
    Config,
    /// Search stored sources by similarity
    Sources {
        /// Text to match against stored content
        query: String,
        /// Number of results
        #[arg(short, long, default_value = "5")]
        n: usize,
        /// Restrict to the collection of a past research topic
        #[arg(long)]
        topic: Option<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "veritas=debug,info"
    } else {
        "veritas=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "veritas", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Research {
            topic,
            max_sources,
            output,
            no_store,
        } => {
            let topic = topic.join(" ");
            let max_sources = max_sources.unwrap_or(config.research.max_sources);
            if !(1..=50).contains(&max_sources) {
                anyhow::bail!("--max-sources must be between 1 and 50, got {}", max_sources);
            }

            let mut settings = PipelineSettings::from_config(&config);
            settings.store_sources = !no_store;
            let graph = build_research_graph(&collaborators(&config)?, &settings)?;

            let result = run_research(&graph, &topic, max_sources).await?;

            let path = output.unwrap_or_else(|| default_report_path(&config, &topic));
            write_report(&path, &result.state.report_html)?;
            print_summary(&result, config.research.trust_threshold);
            println!("\nReport: {}", path.display());
        }
        Commands::Graph => {
            let graph = research_graph_outline(&PipelineSettings::from_config(&config))?;
            println!("{}", graph.describe());
            println!("Nodes: {}", graph.node_names().join(", "));
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Sources { query, n, topic } => {
            let store = open_store(&config)?;
            let collection = topic
                .as_deref()
                .map(|t| collection_name(&config.vector_store.collection_prefix, t));
            let matches = store.search(collection.as_deref(), &query, n, None).await?;
            if matches.is_empty() {
                println!("No stored sources match.");
            }
            for (i, m) in matches.iter().enumerate() {
                println!(
                    "{:>2}. [{:.3}] {:>5.1}/100  {}",
                    i + 1,
                    m.similarity,
                    m.source.trustworthiness_score,
                    m.source.title
                );
                println!("    {}", m.source.url);
            }
        }
        // Generated before config loading
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Load `path`, or fall back to defaults when the default file is absent.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    if path != Path::new(DEFAULT_CONFIG) {
        anyhow::bail!("config file not found: {}", path.display());
    }
    warn!(path = %path.display(), "No config file found, using defaults");
    Ok(AppConfig::default())
}

fn open_store(config: &AppConfig) -> anyhow::Result<SqliteVectorStore> {
    let embedder = veritas_memory::create_embedder(config.embedding.as_ref())?;
    let store = SqliteVectorStore::open(&config.vector_store.path, embedder)?;
    info!(path = %config.vector_store.path.display(), "Vector store opened");
    Ok(store)
}

fn collaborators(config: &AppConfig) -> anyhow::Result<ResearchCollaborators> {
    let llm: Arc<dyn LlmClient> = Arc::from(veritas_llm::create_client(&config.model)?);
    let research = &config.research;

    Ok(ResearchCollaborators {
        query_generator: Arc::new(LlmQueryGenerator::new(
            llm.clone(),
            &config.model,
            research.max_queries,
        )),
        search: Arc::from(create_search_provider(&config.web_search)?),
        scraper: Arc::new(HttpScraper::new(&config.scraper)),
        analyzer: Arc::new(LlmTrustAnalyzer::new(
            llm.clone(),
            &config.model,
            research.preview_chars,
        )),
        writer: Arc::new(LlmReportWriter::new(llm, &config.model)),
        renderer: Arc::new(HtmlReportRenderer::new(
            research.trust_threshold,
            research.max_sources_in_report,
        )),
        store: Arc::new(open_store(config)?),
    })
}

fn default_report_path(config: &AppConfig, topic: &str) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    config
        .research
        .reports_dir
        .join(format!("{}_{}.html", collection_name("report", topic), stamp))
}

fn write_report(path: &Path, html: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)?;
    info!(path = %path.display(), bytes = html.len(), "Report written");
    Ok(())
}

fn print_summary(result: &ExecutionResult<ResearchState>, threshold: f64) {
    let state = &result.state;
    println!("\nResearch: {}", state.topic);
    println!("  {:<12} {}", "Queries:", state.search_queries.len());
    println!("  {:<12} {}", "URLs:", state.discovered_urls.len());
    println!("  {:<12} {}", "Scraped:", state.scraped_sources.len());
    println!("  {:<12} {}", "Failed:", state.failed_urls.len());
    println!(
        "  {:<12} {} ({} at or above {})",
        "Analyzed:",
        state.analyzed_sources.len(),
        state.trustworthy_count(threshold),
        threshold
    );
    println!("  {:<12} {}", "Stored:", state.stored_sources.len());
    println!("  {:<12} {}", "Rejected:", state.rejected_sources.len());
    println!("  {:<12} {}", "Final step:", state.current_step);
    println!(
        "  {:<12} {} ({} ms)",
        "Path:",
        result.path().join(" -> "),
        result.total_elapsed_ms
    );
    if !state.errors.is_empty() {
        println!("  Errors:");
        for e in &state.errors {
            println!("    - {}", e);
        }
    }
}
