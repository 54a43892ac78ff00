use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VeritasError};

/// Top-level Veritas configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub embedding: Option<EmbeddingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// API root; defaults to the provider preset's URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

impl ModelConfig {
    /// Copy of this config with a different sampling temperature.
    pub fn with_temperature(&self, temperature: f32) -> Self {
        Self {
            temperature,
            ..self.clone()
        }
    }
}

fn default_provider() -> String { "ollama".to_string() }
fn default_model_id() -> String { "llama3.2:3b".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.7 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Pipeline-level research settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Upper bound on URLs carried from search into scraping.
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    /// Sources scoring at or above this are stored.
    #[serde(default = "default_trust_threshold")]
    pub trust_threshold: f64,
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    /// Characters of source content shown to the trust analyzer.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    /// Cap on sources listed in the HTML report (None = all).
    #[serde(default)]
    pub max_sources_in_report: Option<usize>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_sources: default_max_sources(),
            trust_threshold: default_trust_threshold(),
            max_queries: default_max_queries(),
            preview_chars: default_preview_chars(),
            reports_dir: default_reports_dir(),
            max_sources_in_report: None,
        }
    }
}

fn default_max_sources() -> usize { 10 }
fn default_trust_threshold() -> f64 { crate::types::DEFAULT_TRUST_THRESHOLD }
fn default_max_queries() -> usize { 5 }
fn default_preview_chars() -> usize { 500 }
fn default_reports_dir() -> PathBuf { PathBuf::from("./data/reports") }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_scraper_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_scraper_timeout(),
            max_retries: default_scraper_retries(),
            min_content_chars: default_min_content_chars(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_scraper_timeout() -> u64 { 10 }
fn default_scraper_retries() -> u32 { 2 }
fn default_min_content_chars() -> usize { 50 }
fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; ResearchAssistant/1.0)".to_string()
}

/// Web search provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// "duckduckgo" (no key) or "tavily".
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_region")]
    pub region: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key: None,
            region: default_search_region(),
        }
    }
}

fn default_search_provider() -> String { "duckduckgo".to_string() }
fn default_search_region() -> String { "wt-wt".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            path: default_vector_db_path(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

fn default_vector_db_path() -> PathBuf { PathBuf::from("./data/vector_db/sources.db") }
fn default_collection_prefix() -> String { "research".to_string() }

/// Embedding model configuration for the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "openai", "ollama", any OpenAI-compatible API, or "local".
    pub provider: String,
    /// Model name (e.g., "nomic-embed-text").
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_dims")]
    pub dimensions: usize,
}

fn default_embedding_dims() -> usize { 384 }

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| VeritasError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| VeritasError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let research = &self.research;
        if !(1..=50).contains(&research.max_sources) {
            return Err(VeritasError::Config(format!(
                "research.max_sources must be between 1 and 50, got {}",
                research.max_sources
            )));
        }
        if !(0.0..=100.0).contains(&research.trust_threshold) {
            return Err(VeritasError::Config(format!(
                "research.trust_threshold must be between 0 and 100, got {}",
                research.trust_threshold
            )));
        }
        if research.max_queries == 0 {
            return Err(VeritasError::Config(
                "research.max_queries must be at least 1".into(),
            ));
        }
        if !(1..=60).contains(&self.scraper.timeout_secs) {
            return Err(VeritasError::Config(format!(
                "scraper.timeout_secs must be between 1 and 60, got {}",
                self.scraper.timeout_secs
            )));
        }
        if self.scraper.max_retries > 5 {
            return Err(VeritasError::Config(format!(
                "scraper.max_retries must be at most 5, got {}",
                self.scraper.max_retries
            )));
        }
        if self.web_search.provider == "tavily" && self.web_search.api_key.is_none() {
            return Err(VeritasError::Config(
                "web_search.api_key is required for the tavily provider".into(),
            ));
        }
        Ok(())
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_VERITAS_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_VERITAS_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_VERITAS_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_VERITAS_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_VERITAS_VAR}\"");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.model.model_id, "llama3.2:3b");
        assert_eq!(config.research.max_sources, 10);
        assert_eq!(config.research.trust_threshold, 85.0);
        assert_eq!(config.scraper.timeout_secs, 10);
        assert_eq!(config.scraper.max_retries, 2);
        assert_eq!(config.scraper.min_content_chars, 50);
        assert_eq!(config.web_search.provider, "duckduckgo");
        assert!(config.embedding.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = AppConfig::default();
        config.research.max_sources = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.research.trust_threshold = 120.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scraper.max_retries = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tavily_requires_key() {
        let toml_str = r#"
[web_search]
provider = "tavily"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_temperature() {
        let config = ModelConfig::default();
        let cold = config.with_temperature(0.3);
        assert_eq!(cold.temperature, 0.3);
        assert_eq!(cold.model_id, config.model_id);
    }
}
