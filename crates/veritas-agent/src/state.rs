use serde::Serialize;

use veritas_core::types::Source;
use veritas_graph::{state_update, GraphState, NodeFailure};

/// Default cap on URLs carried through a run.
pub const DEFAULT_MAX_SOURCES: usize = 10;

/// Step label of a freshly created state.
pub const INITIAL_STEP: &str = "initialized";

/// The record threaded through the research pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchState {
    pub topic: String,
    pub max_sources: usize,

    pub search_queries: Vec<String>,
    pub discovered_urls: Vec<String>,

    pub scraped_sources: Vec<Source>,
    pub failed_urls: Vec<String>,

    pub analyzed_sources: Vec<Source>,

    pub stored_sources: Vec<Source>,
    pub rejected_sources: Vec<Source>,

    pub report_html: String,

    /// Label of the last phase that ran, e.g. `search_complete`.
    pub current_step: String,
    pub errors: Vec<String>,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, max_sources: usize) -> Self {
        Self {
            topic: topic.into(),
            max_sources,
            search_queries: vec![],
            discovered_urls: vec![],
            scraped_sources: vec![],
            failed_urls: vec![],
            analyzed_sources: vec![],
            stored_sources: vec![],
            rejected_sources: vec![],
            report_html: String::new(),
            current_step: INITIAL_STEP.to_string(),
            errors: vec![],
        }
    }

    /// Analyzed sources scoring at or above `threshold`.
    pub fn trustworthy_count(&self, threshold: f64) -> usize {
        self.analyzed_sources
            .iter()
            .filter(|s| s.is_trustworthy(threshold))
            .count()
    }
}

state_update! {
    /// Partial update returned by research nodes.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ResearchUpdate for ResearchState {
        topic: replace String,
        max_sources: replace usize,
        search_queries: replace Vec<String>,
        discovered_urls: accumulate String,
        scraped_sources: accumulate Source,
        failed_urls: accumulate String,
        analyzed_sources: accumulate Source,
        stored_sources: accumulate Source,
        rejected_sources: accumulate Source,
        report_html: replace String,
        current_step: replace String,
        errors: accumulate String,
    }
}

impl ResearchUpdate {
    /// Empty update that only records the step label.
    pub fn step(label: &str) -> Self {
        Self {
            current_step: Some(label.to_string()),
            ..Default::default()
        }
    }
}

impl GraphState for ResearchState {
    type Update = ResearchUpdate;

    fn merge(&mut self, update: ResearchUpdate) {
        update.apply_to(self);
    }

    fn failure_update(failure: NodeFailure<ResearchUpdate>) -> ResearchUpdate {
        let mut update = failure.update;
        update.current_step = Some(failure.step);
        update.errors.push(failure.message);
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_graph::MergePolicy;

    #[test]
    fn test_initial_state() {
        let state = ResearchState::new("quantum computing", DEFAULT_MAX_SOURCES);
        assert_eq!(state.current_step, "initialized");
        assert_eq!(state.max_sources, 10);
        assert!(state.discovered_urls.is_empty());
        assert!(state.errors.is_empty());
        assert!(state.report_html.is_empty());
    }

    #[test]
    fn test_schema_policies() {
        let accumulating: Vec<&str> = ResearchUpdate::SCHEMA
            .iter()
            .filter(|f| f.policy == MergePolicy::Accumulate)
            .map(|f| f.name)
            .collect();
        assert_eq!(
            accumulating,
            vec![
                "discovered_urls",
                "scraped_sources",
                "failed_urls",
                "analyzed_sources",
                "stored_sources",
                "rejected_sources",
                "errors",
            ]
        );
        assert_eq!(ResearchUpdate::SCHEMA.len(), 12);
    }

    #[test]
    fn test_merge_replaces_and_accumulates() {
        let mut state = ResearchState::new("t", 5);
        state.merge(ResearchUpdate {
            search_queries: Some(vec!["a".into()]),
            discovered_urls: vec!["https://1".into()],
            errors: vec!["first".into()],
            ..ResearchUpdate::step("search_complete")
        });
        state.merge(ResearchUpdate {
            search_queries: Some(vec!["b".into()]),
            discovered_urls: vec!["https://2".into()],
            errors: vec!["second".into()],
            ..Default::default()
        });

        assert_eq!(state.search_queries, vec!["b"]);
        assert_eq!(state.discovered_urls, vec!["https://1", "https://2"]);
        assert_eq!(state.errors, vec!["first", "second"]);
        // Untouched replace field keeps its last value.
        assert_eq!(state.current_step, "search_complete");
        assert_eq!(state.topic, "t");
    }

    #[test]
    fn test_failure_update_records_step_and_error() {
        let failure = NodeFailure::new("search_failed", "Search failed: offline").with_update(
            ResearchUpdate {
                discovered_urls: vec![],
                ..Default::default()
            },
        );
        let mut state = ResearchState::new("t", 5);
        state.errors.push("earlier".into());
        state.merge(ResearchState::failure_update(failure));
        assert_eq!(state.current_step, "search_failed");
        assert_eq!(state.errors, vec!["earlier", "Search failed: offline"]);
    }
}
