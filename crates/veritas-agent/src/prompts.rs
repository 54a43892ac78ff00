//! Prompt templates for the LLM-backed collaborators.

use veritas_core::types::Source;

/// Brainstorming, query generation.
pub const TEMPERATURE_CREATIVE: f32 = 0.9;
/// Report writing.
pub const TEMPERATURE_BALANCED: f32 = 0.7;
/// Scoring.
pub const TEMPERATURE_ANALYTICAL: f32 = 0.3;

/// Characters of each source shown in report prompts.
pub const DIGEST_PREVIEW_CHARS: usize = 300;

pub const RESEARCH_SYSTEM_PROMPT: &str =
    "You are a careful research assistant. Answer exactly in the requested format.";

pub fn query_generation_prompt(topic: &str) -> String {
    format!(
        "You are a research assistant helping to explore a topic thoroughly.

Given a research topic, generate 3-5 diverse search queries that will help discover comprehensive information from different angles.

Topic: {topic}

Guidelines:
- Create queries that explore different aspects (what, why, how, history, current state, future)
- Use varied phrasing to discover different sources
- Keep queries concise but specific
- Avoid overly broad or overly narrow queries

Generate search queries (one per line):"
    )
}

pub fn trust_analysis_prompt(topic: &str, url: &str, title: &str, content_preview: &str) -> String {
    format!(
        r#"You are an expert fact-checker and source evaluator.

Analyze the following web source for trustworthiness on a scale of 0-100.

Research Topic: {topic}
Source URL: {url}
Source Title: {title}
Content Preview: {content_preview}

Evaluation Criteria:
1. **Content Quality (30%)**: Coherence, depth, citations, evidence
2. **Bias Detection (20%)**: Objectivity vs propaganda, balanced presentation
3. **Factual Density (15%)**: Ratio of verifiable facts to opinions
4. **Source Credibility (20%)**: Domain authority, author credentials
5. **Relevance (15%)**: How well it addresses the research topic

Return ONLY a JSON object in this exact format:
{{
  "score": <number 0-100>,
  "reasoning": "<2-3 sentence explanation>",
  "red_flags": ["<concern 1>", "<concern 2>"],
  "strengths": ["<strength 1>", "<strength 2>"]
}}"#
    )
}

pub fn summary_prompt(topic: &str, num_sources: usize, digest: &str) -> String {
    format!(
        "You are a research analyst creating an executive summary.

Research Topic: {topic}

Based on the following {num_sources} sources, create a comprehensive but concise executive summary (3-5 paragraphs).

Sources:
{digest}

Guidelines:
- Start with a clear definition or overview
- Highlight key findings and themes across sources
- Note any consensus or disagreements among sources
- Keep it factual and objective
- Write in clear, accessible language

Executive Summary:"
    )
}

pub fn findings_prompt(topic: &str, digest: &str) -> String {
    format!(
        "Extract 5-7 key findings from the research on: {topic}

Based on these sources:
{digest}

For each finding:
- State it clearly and concisely
- Note which source(s) support it
- Indicate confidence level if applicable

Format as a numbered list.

Key Findings:"
    )
}

/// Numbered digest of sources: title, url, score, and a short preview.
pub fn source_digest(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}. [{}]({})\n   Score: {:.1}/100\n   {}\n",
                i + 1,
                s.title,
                s.url,
                s.trustworthiness_score,
                s.content_preview(DIGEST_PREVIEW_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
