use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use futures::future::BoxFuture;

use veritas_core::config::ModelConfig;
use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::*;
use veritas_core::types::*;

use crate::fixtures::scraped_source;

/// LLM that replays scripted responses in order and records every prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: Mutex<Vec<(f32, Vec<ChatMessage>)>>,
}

impl ScriptedLlm {
    pub fn new<I, T>(responses: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a transport error as the next response.
    pub fn then_fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    /// Every call so far as `(temperature, messages)`.
    pub fn calls(&self) -> Vec<(f32, Vec<ChatMessage>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Text of the last user message of call `i`.
    pub fn prompt(&self, i: usize) -> String {
        self.calls.lock().unwrap()[i]
            .1
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>> {
        self.calls
            .lock()
            .unwrap()
            .push((config.temperature, messages));
        let next = self.responses.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(VeritasError::LlmRequest(message)),
                None => Err(VeritasError::LlmRequest("no scripted response left".into())),
            }
        })
    }
}

/// Query generator returning a fixed list, or a fixed error.
pub struct StaticQueryGenerator {
    queries: Vec<String>,
    error: Option<String>,
}

impl StaticQueryGenerator {
    pub fn new(queries: &[&str]) -> Self {
        Self {
            queries: queries.iter().map(|q| q.to_string()).collect(),
            error: None,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            queries: vec![],
            error: Some(message.to_string()),
        }
    }
}

impl QueryGenerator for StaticQueryGenerator {
    fn generate(&self, _topic: &str) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            match &self.error {
                Some(e) => Err(VeritasError::LlmRequest(e.clone())),
                None => Ok(self.queries.clone()),
            }
        })
    }
}

/// Search returning canned URLs per query. Unknown queries return nothing.
#[derive(Default)]
pub struct StaticSearch {
    results: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn failing_query(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// `(query, max_results)` for every call, in order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebSearch for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    fn search(&self, query: &str, max_results: usize) -> BoxFuture<'_, Result<Vec<SearchHit>>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        let outcome = if self.failing.contains(query) {
            Err(VeritasError::Search(format!("provider rejected '{}'", query)))
        } else {
            Ok(self
                .results
                .get(query)
                .map(|urls| {
                    urls.iter()
                        .take(max_results)
                        .map(|u| SearchHit {
                            title: format!("Result {}", u),
                            url: u.clone(),
                            snippet: String::new(),
                        })
                        .collect()
                })
                .unwrap_or_default())
        };
        Box::pin(async move { outcome })
    }
}

/// Scraper that succeeds with fixture content unless the URL is marked failing.
#[derive(Default)]
pub struct StaticScraper {
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, ScrapeOptions)>>,
}

impl StaticScraper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, ScrapeOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Scraper for StaticScraper {
    fn scrape(&self, url: &str, options: ScrapeOptions) -> BoxFuture<'_, Result<Source>> {
        self.calls.lock().unwrap().push((url.to_string(), options));
        let outcome = if self.failing.contains(url) {
            Err(VeritasError::Scrape {
                url: url.to_string(),
                message: "HTTP 404 Not Found".into(),
            })
        } else {
            Ok(scraped_source(url))
        };
        Box::pin(async move { outcome })
    }
}

/// Analyzer that looks scores up by URL.
pub struct ScoreTableAnalyzer {
    scores: HashMap<String, f64>,
    failing: HashSet<String>,
    default_score: f64,
}

impl ScoreTableAnalyzer {
    pub fn new(default_score: f64) -> Self {
        Self {
            scores: HashMap::new(),
            failing: HashSet::new(),
            default_score,
        }
    }

    pub fn with_score(mut self, url: &str, score: f64) -> Self {
        self.scores.insert(url.to_string(), score);
        self
    }

    pub fn failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl TrustAnalyzer for ScoreTableAnalyzer {
    fn analyze(&self, source: &Source, _topic: &str) -> BoxFuture<'_, Result<TrustAssessment>> {
        let outcome = if self.failing.contains(&source.url) {
            Err(VeritasError::Analysis("model timed out".into()))
        } else {
            let score = self
                .scores
                .get(&source.url)
                .copied()
                .unwrap_or(self.default_score);
            Ok(TrustAssessment {
                score,
                reasoning: format!("Table score {}", score),
                red_flags: vec![],
                strengths: vec!["Listed in score table".into()],
            })
        };
        Box::pin(async move { outcome })
    }
}

/// Report writer with a fixed narrative.
pub struct StaticReportWriter {
    narrative: ReportNarrative,
    calls: Mutex<Vec<(String, usize)>>,
}

impl StaticReportWriter {
    pub fn new(summary: &str, findings: &str) -> Self {
        Self {
            narrative: ReportNarrative {
                summary: summary.to_string(),
                findings: findings.to_string(),
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(topic, source count)` for every call.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for StaticReportWriter {
    fn default() -> Self {
        Self::new("Summary paragraph.", "1. First finding.")
    }
}

impl ReportWriter for StaticReportWriter {
    fn write(&self, topic: &str, sources: &[Source]) -> BoxFuture<'_, ReportNarrative> {
        self.calls
            .lock()
            .unwrap()
            .push((topic.to_string(), sources.len()));
        let narrative = self.narrative.clone();
        Box::pin(async move { narrative })
    }
}

/// Renderer that always fails.
pub struct FailingRenderer(pub String);

impl ReportRenderer for FailingRenderer {
    fn render(&self, _topic: &str, _sources: &[Source], _narrative: &ReportNarrative) -> Result<String> {
        Err(VeritasError::Report(self.0.clone()))
    }
}

/// Vector store kept in memory, optionally failing every write.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<String, Vec<Source>>>,
    add_calls: Mutex<Vec<(String, usize)>>,
    fail_with: Option<String>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Sources currently stored in `collection`.
    pub fn stored(&self, collection: &str) -> Vec<Source> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// `(collection, batch size)` for every `add` call.
    pub fn add_calls(&self) -> Vec<(String, usize)> {
        self.add_calls.lock().unwrap().clone()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn add(&self, collection: &str, sources: &[Source]) -> BoxFuture<'_, Result<()>> {
        self.add_calls
            .lock()
            .unwrap()
            .push((collection.to_string(), sources.len()));
        let outcome = match &self.fail_with {
            Some(message) => Err(VeritasError::Database(message.clone())),
            None => {
                let mut collections = self.collections.lock().unwrap();
                let stored = collections.entry(collection.to_string()).or_default();
                for source in sources {
                    stored.retain(|s| s.url != source.url);
                    stored.push(source.clone());
                }
                Ok(())
            }
        };
        Box::pin(async move { outcome })
    }

    fn query_similar(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SimilarSource>>> {
        let needle = text.to_lowercase();
        let hits: Vec<SimilarSource> = self
            .stored(collection)
            .into_iter()
            .filter(|s| s.content.to_lowercase().contains(&needle))
            .take(limit)
            .map(|source| SimilarSource {
                source,
                similarity: 1.0,
            })
            .collect();
        Box::pin(async move { Ok(hits) })
    }

    fn get_by_url(&self, collection: &str, url: &str) -> BoxFuture<'_, Result<Option<Source>>> {
        let found = self.stored(collection).into_iter().find(|s| s.url == url);
        Box::pin(async move { Ok(found) })
    }
}
