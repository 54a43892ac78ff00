use std::io::Write;
use std::path::Path;

use veritas_core::config::AppConfig;
use veritas_core::error::VeritasError;
use veritas_test_utils::write_config;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"
api_key = "sk-test-key"
max_tokens = 4096
temperature = 0.5

[model.retry]
max_retries = 5
initial_backoff_ms = 200

[research]
max_sources = 20
trust_threshold = 75.0
max_queries = 3
reports_dir = "/tmp/veritas-reports"
max_sources_in_report = 8

[scraper]
timeout_secs = 15
max_retries = 1
user_agent = "veritas-test"

[web_search]
provider = "tavily"
api_key = "tvly-test"

[vector_store]
path = "/tmp/veritas-test/sources.db"
collection_prefix = "kb"

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dimensions = 768
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 4096);
    let retry = config.model.retry.expect("retry present");
    assert_eq!(retry.max_retries, 5);
    assert_eq!(retry.initial_backoff_ms, 200);
    assert_eq!(retry.max_backoff_ms, 30000);

    assert_eq!(config.research.max_sources, 20);
    assert_eq!(config.research.trust_threshold, 75.0);
    assert_eq!(config.research.max_queries, 3);
    assert_eq!(config.research.preview_chars, 500);
    assert_eq!(config.research.max_sources_in_report, Some(8));

    assert_eq!(config.scraper.timeout_secs, 15);
    assert_eq!(config.scraper.max_retries, 1);
    assert_eq!(config.scraper.min_content_chars, 50);
    assert_eq!(config.scraper.user_agent, "veritas-test");

    assert_eq!(config.web_search.provider, "tavily");
    assert_eq!(config.web_search.region, "wt-wt");
    assert_eq!(config.vector_store.collection_prefix, "kb");

    let embedding = config.embedding.expect("embedding present");
    assert_eq!(embedding.model, "nomic-embed-text");
    assert_eq!(embedding.dimensions, 768);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("VERITAS_TEST_API_KEY", "expanded-key-value");

    let (_dir, path) = write_config(
        r#"
[model]
model_id = "test-model"
api_key = "${VERITAS_TEST_API_KEY}"
"#,
    );

    let config = AppConfig::load(&path).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("VERITAS_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let (_dir, path) = write_config(
        r#"
[model]
model_id = "llama3.2"
"#,
    );

    let config = AppConfig::load(&path).expect("load config");

    assert_eq!(config.model.provider, "ollama");
    assert!(config.model.base_url.is_none());
    assert!(config.model.retry.is_none());
    assert_eq!(config.research.max_sources, 10);
    assert_eq!(config.research.trust_threshold, 85.0);
    assert_eq!(config.research.reports_dir, Path::new("./data/reports"));
    assert!(config.research.max_sources_in_report.is_none());
    assert_eq!(config.scraper.timeout_secs, 10);
    assert_eq!(config.web_search.provider, "duckduckgo");
    assert_eq!(config.vector_store.collection_prefix, "research");
    assert!(config.embedding.is_none());
}

#[test]
fn test_missing_file_is_not_found() {
    let err = AppConfig::load(Path::new("/nonexistent/veritas.toml")).unwrap_err();
    assert!(matches!(err, VeritasError::ConfigNotFound(_)));
}

#[test]
fn test_out_of_range_values_rejected() {
    let (_dir, path) = write_config(
        r#"
[research]
max_sources = 80
"#,
    );
    let err = AppConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("research.max_sources"));

    let (_dir, path) = write_config(
        r#"
[scraper]
timeout_secs = 0
"#,
    );
    assert!(AppConfig::load(&path).is_err());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let (_dir, path) = write_config("[research\nmax_sources = 3");
    let err = AppConfig::load(&path).unwrap_err();
    assert!(matches!(err, VeritasError::Config(_)));
}
