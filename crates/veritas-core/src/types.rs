use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score at or above which a source counts as trustworthy.
pub const DEFAULT_TRUST_THRESHOLD: f64 = 85.0;

/// Score assigned when an analysis cannot produce one.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Metadata key holding the serialized [`TrustAssessment`].
pub const ANALYSIS_METADATA_KEY: &str = "trustworthiness_analysis";

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message sent to a completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// One web document discovered, scraped and analyzed during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Unique key within a run.
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// 0-100, attached by the trust analyzer.
    #[serde(default)]
    pub trustworthiness_score: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub scraped_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            trustworthiness_score: 0.0,
            metadata: BTreeMap::new(),
            scraped_at: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.trustworthiness_score = score;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_trustworthy(&self, threshold: f64) -> bool {
        self.trustworthiness_score >= threshold
    }

    /// Host part of the URL, empty if the URL does not parse.
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// First `max_chars` characters of the content, with an ellipsis when cut.
    pub fn content_preview(&self, max_chars: usize) -> String {
        match self.content.char_indices().nth(max_chars) {
            Some((idx, _)) => format!("{}...", &self.content[..idx]),
            None => self.content.clone(),
        }
    }

    /// Attach a score and its reasoning.
    pub fn apply_assessment(&mut self, assessment: &TrustAssessment) {
        self.trustworthiness_score = assessment.score;
        if let Ok(value) = serde_json::to_value(assessment) {
            self.metadata.insert(ANALYSIS_METADATA_KEY.to_string(), value);
        }
    }

    pub fn assessment(&self) -> Option<TrustAssessment> {
        self.metadata
            .get(ANALYSIS_METADATA_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// A single web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// Structured outcome of a trustworthiness analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAssessment {
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

impl TrustAssessment {
    pub fn neutral(reasoning: impl Into<String>) -> Self {
        Self {
            score: NEUTRAL_SCORE,
            reasoning: reasoning.into(),
            red_flags: vec![],
            strengths: vec![],
        }
    }
}

/// LLM-written prose that goes into a report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportNarrative {
    pub summary: String,
    pub findings: String,
}

/// Per-request scraping limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

/// A stored source ranked by similarity to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSource {
    pub source: Source,
    pub similarity: f32,
}

/// Score statistics over a set of analyzed sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub total: usize,
    pub trustworthy: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    /// 90 and above.
    pub excellent: usize,
    /// 80 to 89.
    pub good: usize,
    /// 70 to 79.
    pub fair: usize,
    /// Below 70.
    pub poor: usize,
}

impl SourceStats {
    pub fn from_sources(sources: &[Source], threshold: f64) -> Self {
        if sources.is_empty() {
            return Self::default();
        }
        let scores: Vec<f64> = sources.iter().map(|s| s.trustworthiness_score).collect();
        Self {
            total: scores.len(),
            trustworthy: sources.iter().filter(|s| s.is_trustworthy(threshold)).count(),
            average: scores.iter().sum::<f64>() / scores.len() as f64,
            min: scores.iter().cloned().fold(f64::INFINITY, f64::min),
            max: scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            excellent: scores.iter().filter(|s| **s >= 90.0).count(),
            good: scores.iter().filter(|s| (80.0..90.0).contains(*s)).count(),
            fair: scores.iter().filter(|s| (70.0..80.0).contains(*s)).count(),
            poor: scores.iter().filter(|s| **s < 70.0).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_boundary_is_inclusive() {
        let source = Source::new("https://a.org", "A", "text").with_score(85.0);
        assert!(source.is_trustworthy(DEFAULT_TRUST_THRESHOLD));
        let source = source.with_score(84.9);
        assert!(!source.is_trustworthy(DEFAULT_TRUST_THRESHOLD));
    }

    #[test]
    fn test_domain() {
        let source = Source::new("https://en.wikipedia.org/wiki/Qubit", "", "");
        assert_eq!(source.domain(), "en.wikipedia.org");
        assert_eq!(Source::new("not a url", "", "").domain(), "");
    }

    #[test]
    fn test_content_preview() {
        let source = Source::new("https://a.org", "", "héllo world");
        assert_eq!(source.content_preview(5), "héllo...");
        assert_eq!(source.content_preview(50), "héllo world");
    }

    #[test]
    fn test_assessment_roundtrip_through_metadata() {
        let mut source = Source::new("https://a.org", "A", "text");
        let assessment = TrustAssessment {
            score: 91.0,
            reasoning: "peer reviewed".into(),
            red_flags: vec![],
            strengths: vec!["citations".into()],
        };
        source.apply_assessment(&assessment);
        assert_eq!(source.trustworthiness_score, 91.0);
        assert_eq!(source.assessment(), Some(assessment));
    }

    #[test]
    fn test_source_stats() {
        let sources: Vec<Source> = [92.0, 88.0, 75.0, 40.0]
            .iter()
            .map(|s| Source::new("https://a.org", "", "").with_score(*s))
            .collect();
        let stats = SourceStats::from_sources(&sources, DEFAULT_TRUST_THRESHOLD);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.trustworthy, 2);
        assert_eq!(stats.average, 73.75);
        assert_eq!(stats.min, 40.0);
        assert_eq!(stats.max, 92.0);
        assert_eq!((stats.excellent, stats.good, stats.fair, stats.poor), (1, 1, 1, 1));
    }

    #[test]
    fn test_source_stats_empty() {
        assert_eq!(SourceStats::from_sources(&[], 85.0), SourceStats::default());
    }
}
