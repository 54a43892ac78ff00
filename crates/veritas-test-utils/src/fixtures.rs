use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use serde_json::json;

use veritas_core::types::{Source, TrustAssessment};

/// Body text long enough to pass the scraper's content minimum.
pub const LOREM: &str = "Quantum computers use qubits, which can represent zero and one at \
the same time. Entanglement and interference let certain algorithms outperform classical \
machines on specific problems such as factoring and simulation.";

/// A scraped, not yet analyzed source.
pub fn scraped_source(url: &str) -> Source {
    let mut source = Source::new(url, format!("Article at {}", url), LOREM);
    let domain = source.domain();
    let words = source.word_count();
    source.metadata.insert("domain".into(), json!(domain));
    source.metadata.insert("word_count".into(), json!(words));
    source.scraped_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    source
}

/// A source with a score and a matching assessment attached.
pub fn analyzed_source(url: &str, score: f64) -> Source {
    let mut source = scraped_source(url);
    source.apply_assessment(&TrustAssessment {
        score,
        reasoning: format!("Scored {} in fixture", score),
        red_flags: if score < 70.0 {
            vec!["Unsupported claims".into()]
        } else {
            vec![]
        },
        strengths: vec!["Cites primary sources".into()],
    });
    source
}

/// Analyzed sources `https://source{i}.example.org/` with the given scores.
pub fn analyzed_sources(scores: &[f64]) -> Vec<Source> {
    scores
        .iter()
        .enumerate()
        .map(|(i, score)| analyzed_source(&format!("https://source{}.example.org/", i + 1), *score))
        .collect()
}

/// Write a TOML config into a fresh temp dir. Keep the dir alive while the path is used.
pub fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veritas.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}
