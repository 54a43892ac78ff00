use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use veritas_core::config::ModelConfig;
use veritas_core::error::Result;
use veritas_core::traits::{LlmClient, TrustAnalyzer};
use veritas_core::types::{ChatMessage, Source, TrustAssessment};

use crate::prompts::{trust_analysis_prompt, RESEARCH_SYSTEM_PROMPT, TEMPERATURE_ANALYTICAL};

/// Scores sources with an LLM against weighted trust criteria.
pub struct LlmTrustAnalyzer {
    llm: Arc<dyn LlmClient>,
    config: ModelConfig,
    preview_chars: usize,
}

impl LlmTrustAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, config: &ModelConfig, preview_chars: usize) -> Self {
        Self {
            llm,
            config: config.with_temperature(TEMPERATURE_ANALYTICAL),
            preview_chars,
        }
    }
}

impl TrustAnalyzer for LlmTrustAnalyzer {
    fn analyze(&self, source: &Source, topic: &str) -> BoxFuture<'_, Result<TrustAssessment>> {
        let prompt = trust_analysis_prompt(
            topic,
            &source.url,
            &source.title,
            &source.content_preview(self.preview_chars),
        );
        let url = source.url.clone();
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ];
            let text = self.llm.complete(&self.config, messages).await?;
            let assessment = parse_assessment(&text);
            debug!(url = %url, score = assessment.score, "Source analyzed");
            Ok(assessment)
        })
    }
}

/// Locate the JSON object in a model response: fenced block first, then outermost braces.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }
    trimmed
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Numeric score from a JSON value; `"NaN"` and `"inf"` strings are rejected.
fn score_of(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    raw.filter(|v| v.is_finite())
}

fn score_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)score["\s:]+(\d+(?:\.\d+)?)"#).unwrap())
}

/// Turn a model response into an assessment. Never fails.
///
/// Falls back to a regex score scrape for malformed JSON, then to the neutral score.
pub fn parse_assessment(text: &str) -> TrustAssessment {
    let json_str = extract_json(text);

    if let Ok(value) = serde_json::from_str::<Value>(json_str) {
        if let Some(raw) = score_of(&value["score"]) {
            let score = raw.clamp(0.0, 100.0);
            if score != raw {
                warn!(score = raw, "Score out of range, clamping to 0-100");
            }
            return TrustAssessment {
                score,
                reasoning: value["reasoning"]
                    .as_str()
                    .unwrap_or("No reasoning provided")
                    .to_string(),
                red_flags: string_list(&value["red_flags"]),
                strengths: string_list(&value["strengths"]),
            };
        }
    }

    if let Some(score) = score_pattern()
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
    {
        warn!(score, "Extracted score from malformed analysis response");
        return TrustAssessment {
            score: score.clamp(0.0, 100.0),
            reasoning: "Extracted from malformed response".to_string(),
            red_flags: vec![],
            strengths: vec![],
        };
    }

    warn!("Could not parse analysis response, assigning neutral score");
    TrustAssessment::neutral("Could not parse analysis response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_core::types::NEUTRAL_SCORE;
    use veritas_test_utils::{scraped_source, ScriptedLlm};

    #[test]
    fn test_parse_plain_json() {
        let a = parse_assessment(
            r#"{"score": 88, "reasoning": "Peer reviewed.", "red_flags": [], "strengths": ["citations"]}"#,
        );
        assert_eq!(a.score, 88.0);
        assert_eq!(a.reasoning, "Peer reviewed.");
        assert_eq!(a.strengths, vec!["citations"]);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = "Here is my analysis:\n```json\n{\"score\": 72.5, \"red_flags\": [\"no author\"]}\n```\nThanks";
        let a = parse_assessment(text);
        assert_eq!(a.score, 72.5);
        assert_eq!(a.red_flags, vec!["no author"]);
        assert_eq!(a.reasoning, "No reasoning provided");
    }

    #[test]
    fn test_parse_clamps_score() {
        assert_eq!(parse_assessment(r#"{"score": 140}"#).score, 100.0);
        assert_eq!(parse_assessment(r#"{"score": -5}"#).score, 0.0);
        assert_eq!(parse_assessment(r#"{"score": "91"}"#).score, 91.0);
    }

    #[test]
    fn test_parse_malformed_uses_regex() {
        let a = parse_assessment("Overall Score: 64 - mostly opinion");
        assert_eq!(a.score, 64.0);
        assert_eq!(a.reasoning, "Extracted from malformed response");

        let a = parse_assessment(r#"{"score": 77, "reasoning": "cut off"#);
        assert_eq!(a.score, 77.0);
    }

    #[test]
    fn test_parse_unusable_is_neutral() {
        let a = parse_assessment("I cannot evaluate this page.");
        assert_eq!(a.score, NEUTRAL_SCORE);
        assert_eq!(a.reasoning, "Could not parse analysis response");
    }

    #[test]
    fn test_parse_non_finite_score_is_neutral() {
        for reply in [
            r#"{"score": "NaN", "reasoning": "unsure"}"#,
            r#"{"score": "inf", "reasoning": "certain"}"#,
            r#"{"score": "-Infinity"}"#,
        ] {
            let a = parse_assessment(reply);
            assert_eq!(a.score, NEUTRAL_SCORE, "reply: {reply}");
            assert!(a.score.is_finite());
        }
    }

    #[tokio::test]
    async fn test_analyze_sends_preview_at_low_temperature() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"score": 90, "reasoning": "ok"}"#]));
        let analyzer = LlmTrustAnalyzer::new(llm.clone(), &ModelConfig::default(), 20);
        let source = scraped_source("https://a.org/qc");
        let a = analyzer.analyze(&source, "quantum computing").await.unwrap();
        assert_eq!(a.score, 90.0);
        assert_eq!(llm.calls()[0].0, TEMPERATURE_ANALYTICAL);
        let prompt = llm.prompt(0);
        assert!(prompt.contains("Research Topic: quantum computing"));
        assert!(prompt.contains(&source.content_preview(20)));
        assert!(!prompt.contains(&source.content));
    }

    #[tokio::test]
    async fn test_analyze_propagates_transport_errors() {
        let llm = Arc::new(ScriptedLlm::new(Vec::<String>::new()).then_fail("connection refused"));
        let analyzer = LlmTrustAnalyzer::new(llm, &ModelConfig::default(), 500);
        let source = scraped_source("https://a.org/qc");
        assert!(analyzer.analyze(&source, "t").await.is_err());
    }
}
