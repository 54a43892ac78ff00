/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    /// API root; `/chat/completions` is appended per request.
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1",
            needs_api_key: false,
        }),
        "openai" => Some(ProviderPreset {
            default_base_url: "https://api.openai.com/v1",
            needs_api_key: true,
        }),
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1",
            needs_api_key: true,
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1",
            needs_api_key: true,
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1",
            needs_api_key: true,
        }),
        "mistral" => Some(ProviderPreset {
            default_base_url: "https://api.mistral.ai/v1",
            needs_api_key: true,
        }),
        "deepseek" => Some(ProviderPreset {
            default_base_url: "https://api.deepseek.com/v1",
            needs_api_key: true,
        }),
        // Self-hosted servers (vLLM, llama.cpp, LM Studio) configure base_url themselves.
        "openai-compatible" => Some(ProviderPreset {
            default_base_url: "http://localhost:8000/v1",
            needs_api_key: false,
        }),
        _ => None,
    }
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &[
        "ollama",
        "openai",
        "groq",
        "openrouter",
        "together",
        "mistral",
        "deepseek",
        "openai-compatible",
    ]
}
