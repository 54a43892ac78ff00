use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use veritas_core::config::ModelConfig;
use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::LlmClient;
use veritas_core::types::{ChatMessage, Role};

use super::presets::get_preset;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI-compatible client. Works with Ollama, OpenAI, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
pub(crate) struct OaiMessage {
    role: &'static str,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .map(|m| OaiMessage {
            role: match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content,
        })
        .collect()
}

/// Chat-completions endpoint for a config: explicit base_url, else the preset's.
pub(crate) fn completions_url(config: &ModelConfig) -> String {
    let base = config
        .base_url
        .clone()
        .or_else(|| get_preset(&config.provider).map(|p| p.default_base_url.to_string()))
        .unwrap_or_else(|| OPENAI_API_BASE.to_string());
    let base = base.trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{}/chat/completions", base)
    }
}

fn parse_response(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| VeritasError::LlmParse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| VeritasError::LlmParse("response contained no message content".into()))
}

impl LlmClient for OpenAiClient {
    fn complete(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<String>> {
        let config = config.clone();

        Box::pin(async move {
            let url = completions_url(&config);
            let body = ChatRequest {
                model: config.model_id.clone(),
                messages: convert_messages(messages),
                max_tokens: config.max_tokens,
                temperature: if config.temperature > 0.0 {
                    Some(config.temperature)
                } else {
                    None
                },
                stream: false,
            };

            debug!(url = %url, model = %config.model_id, "Sending chat completion");
            let mut req = self.http.post(&url).json(&body);

            if let Some(api_key) = &config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            let response = req
                .send()
                .await
                .map_err(|e| VeritasError::LlmRequest(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| VeritasError::LlmRequest(e.to_string()))?;
            if !status.is_success() {
                return Err(VeritasError::LlmRequest(format!("HTTP {}: {}", status, text)));
            }

            parse_response(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_from_preset() {
        let config = ModelConfig::default();
        assert_eq!(
            completions_url(&config),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_completions_url_explicit_base() {
        let config = ModelConfig {
            base_url: Some("http://gpu-box:8000/v1/".into()),
            ..ModelConfig::default()
        };
        assert_eq!(completions_url(&config), "http://gpu-box:8000/v1/chat/completions");

        let config = ModelConfig {
            base_url: Some("http://gpu-box:8000/v1/chat/completions".into()),
            ..ModelConfig::default()
        };
        assert_eq!(completions_url(&config), "http://gpu-box:8000/v1/chat/completions");
    }

    #[test]
    fn test_convert_messages_roles() {
        let msgs = convert_messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
        ]);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "user");
        assert_eq!(msgs[1].content, "hi");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "hello");

        let empty = r#"{"choices":[]}"#;
        assert!(matches!(parse_response(empty), Err(VeritasError::LlmParse(_))));
        assert!(parse_response("not json").is_err());
    }
}
