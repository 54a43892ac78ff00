use veritas_graph::RouteLabel;

use crate::state::ResearchState;

/// Branch taken after analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreDecision {
    /// At least one source cleared the trust threshold.
    Storage,
    Report,
}

impl RouteLabel for StoreDecision {
    fn as_str(&self) -> &'static str {
        match self {
            StoreDecision::Storage => "storage",
            StoreDecision::Report => "report",
        }
    }

    fn variants() -> &'static [Self] {
        &[StoreDecision::Storage, StoreDecision::Report]
    }
}

/// Storage if any analyzed source scores at or above `threshold`.
pub fn store_decision(state: &ResearchState, threshold: f64) -> StoreDecision {
    if state
        .analyzed_sources
        .iter()
        .any(|s| s.is_trustworthy(threshold))
    {
        StoreDecision::Storage
    } else {
        StoreDecision::Report
    }
}

/// Routing predicate for the edge leaving the analyzer.
pub fn should_store_sources(
    threshold: f64,
) -> impl Fn(&ResearchState) -> StoreDecision + Send + Sync + 'static {
    move |state| store_decision(state, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use veritas_test_utils::analyzed_sources;

    fn state_with(scores: &[f64]) -> ResearchState {
        let mut state = ResearchState::new("t", 10);
        state.analyzed_sources = analyzed_sources(scores);
        state
    }

    #[test]
    fn test_routes_to_storage_at_threshold() {
        let route = should_store_sources(85.0);
        assert_eq!(route(&state_with(&[40.0, 85.0])), StoreDecision::Storage);
        assert_eq!(route(&state_with(&[84.9, 60.0])), StoreDecision::Report);
        assert_eq!(route(&state_with(&[])), StoreDecision::Report);
    }

    #[test]
    fn test_labels() {
        let labels: Vec<&str> = StoreDecision::variants().iter().map(|l| l.as_str()).collect();
        assert_eq!(labels, vec!["storage", "report"]);
    }
}
