use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};

use veritas_core::config::ModelConfig;
use veritas_core::traits::{LlmClient, ReportWriter};
use veritas_core::types::{ChatMessage, ReportNarrative, Source};

use crate::prompts::{
    findings_prompt, source_digest, summary_prompt, RESEARCH_SYSTEM_PROMPT, TEMPERATURE_BALANCED,
};

/// Writes the executive summary and key findings with an LLM.
///
/// A failed call becomes an error sentence in the report instead of failing the run.
pub struct LlmReportWriter {
    llm: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl LlmReportWriter {
    pub fn new(llm: Arc<dyn LlmClient>, config: &ModelConfig) -> Self {
        Self {
            llm,
            config: config.with_temperature(TEMPERATURE_BALANCED),
        }
    }

    async fn ask(&self, prompt: String) -> veritas_core::Result<String> {
        let messages = vec![
            ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let text = self.llm.complete(&self.config, messages).await?;
        Ok(text.trim().to_string())
    }
}

impl ReportWriter for LlmReportWriter {
    fn write(&self, topic: &str, sources: &[Source]) -> BoxFuture<'_, ReportNarrative> {
        let topic = topic.to_string();
        let digest = source_digest(sources);
        let count = sources.len();
        Box::pin(async move {
            info!(sources = count, "Generating executive summary");
            let summary = match self.ask(summary_prompt(&topic, count, &digest)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Executive summary failed");
                    format!("Error generating executive summary: {}", e)
                }
            };

            info!(sources = count, "Extracting key findings");
            let findings = match self.ask(findings_prompt(&topic, &digest)).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Key findings failed");
                    format!("Error extracting key findings: {}", e)
                }
            };

            ReportNarrative { summary, findings }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_test_utils::{analyzed_sources, ScriptedLlm};

    #[tokio::test]
    async fn test_write_summary_and_findings() {
        let llm = Arc::new(ScriptedLlm::new([
            "  Qubits are the unit of quantum information.\n",
            "1. Superposition\n2. Entanglement",
        ]));
        let writer = LlmReportWriter::new(llm.clone(), &ModelConfig::default());
        let sources = analyzed_sources(&[92.0, 88.0]);
        let narrative = writer.write("quantum computing", &sources).await;

        assert_eq!(narrative.summary, "Qubits are the unit of quantum information.");
        assert_eq!(narrative.findings, "1. Superposition\n2. Entanglement");
        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(t, _)| *t == TEMPERATURE_BALANCED));
        assert!(llm.prompt(0).contains("following 2 sources"));
        assert!(llm.prompt(1).contains("[Article at https://source1.example.org/]"));
    }

    #[tokio::test]
    async fn test_llm_failure_becomes_text() {
        let llm = Arc::new(
            ScriptedLlm::new(Vec::<String>::new())
                .then_fail("HTTP 503")
                .then_fail("HTTP 503"),
        );
        let writer = LlmReportWriter::new(llm, &ModelConfig::default());
        let narrative = writer.write("t", &analyzed_sources(&[90.0])).await;
        assert_eq!(
            narrative.summary,
            "Error generating executive summary: LLM request failed: HTTP 503"
        );
        assert_eq!(
            narrative.findings,
            "Error extracting key findings: LLM request failed: HTTP 503"
        );
    }
}
