pub mod providers;
pub mod retry;

use veritas_core::config::ModelConfig;
use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::LlmClient;

pub use providers::openai::OpenAiClient;
pub use retry::RetryingClient;

/// Create an LLM client for the configured provider, wrapped with retries.
///
/// Every supported provider speaks the OpenAI chat-completions protocol.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn LlmClient>> {
    let preset = providers::presets::get_preset(&config.provider).ok_or_else(|| {
        VeritasError::UnsupportedProvider(format!(
            "{} (known: {})",
            config.provider,
            providers::presets::all_preset_names().join(", ")
        ))
    })?;
    if preset.needs_api_key && config.api_key.is_none() {
        return Err(VeritasError::Config(format!(
            "model.api_key is required for provider '{}'",
            config.provider
        )));
    }

    let retry = config.retry.clone().unwrap_or_default();
    Ok(Box::new(RetryingClient::new(
        Box::new(OpenAiClient::new()),
        retry,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_for_ollama() {
        assert!(create_client(&ModelConfig::default()).is_ok());
    }

    #[test]
    fn test_create_client_requires_key_for_cloud() {
        let config = ModelConfig {
            provider: "groq".into(),
            api_key: None,
            ..ModelConfig::default()
        };
        assert!(matches!(create_client(&config), Err(VeritasError::Config(_))));
    }

    #[test]
    fn test_create_client_unknown_provider() {
        let config = ModelConfig {
            provider: "carrier-pigeon".into(),
            ..ModelConfig::default()
        };
        assert!(matches!(
            create_client(&config),
            Err(VeritasError::UnsupportedProvider(_))
        ));
    }
}
