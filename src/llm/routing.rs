use serde::{Deserialize, Serialize};

/// Closed set of provider families the facade knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAi,
    Claude,
    Gemini,
    Mistral,
    Ollama,
    Codestral,
    DeepSeek,
    LmStudio,
    OpenRouter,
    Groq,
    /// Llama family served through an Ollama-compatible endpoint.
    Llama,
}

impl Provider {
    /// Parses the lowercase provider identifiers used by `*_PROVIDER` env
    /// vars and workspace/agent configuration.
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw.to_ascii_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "claude" | "anthropic" => Provider::Claude,
            "gemini" | "google" => Provider::Gemini,
            "mistral" => Provider::Mistral,
            "ollama" => Provider::Ollama,
            "codestral" => Provider::Codestral,
            "deepseek" => Provider::DeepSeek,
            "lmstudio" | "lm_studio" => Provider::LmStudio,
            "openrouter" => Provider::OpenRouter,
            "groq" => Provider::Groq,
            "llama" => Provider::Llama,
            _ => return None,
        })
    }

    fn env_var(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Claude => Some("ANTHROPIC_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::Mistral | Provider::Codestral => Some("MISTRAL_API_KEY"),
            Provider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Groq => Some("GROQ_API_KEY"),
            Provider::LmStudio | Provider::Ollama | Provider::Llama => None,
        }
    }

    fn is_local(self) -> bool {
        matches!(self, Provider::Ollama | Provider::Llama | Provider::LmStudio)
    }

    fn default_base_url(self) -> Option<&'static str> {
        match self {
            Provider::Codestral => Some("https://api.codestral.com/v1"),
            Provider::DeepSeek => Some("https://api.deepseek.com/v1"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::Ollama | Provider::Llama => Some("http://localhost:11434"),
            Provider::LmStudio => Some("http://localhost:1234/v1"),
            _ => None,
        }
    }
}

/// Vendor prefixes GROQ accepts verbatim (the model keeps the prefix, only
/// gains a leading `groq/`).
const GROQ_SPECIAL_PREFIXES: &[&str] = &["openai/", "meta-llama/", "moonshotai/", "qwen/"];

/// Normalized provider configuration handed uniformly to the facade.
/// Provider-specific quirks (Groq prefixing, Ollama's `num_predict`) are
/// resolved once here and never leak past [`client::LlmClient`].
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: Provider,
    /// Bare model identifier as configured on the agent/workspace.
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
}

impl ModelSpec {
    pub fn new(provider: Provider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Resolve the API key: explicit override, then the provider's
    /// environment variable, then a placeholder for providers that don't
    /// need one.
    pub fn resolve_api_key(&self) -> Option<String> {
        if self.api_key.is_some() {
            return self.api_key.clone();
        }
        if let Some(var) = self.provider.env_var() {
            if let Ok(key) = std::env::var(var) {
                return Some(key);
            }
        }
        if self.provider.is_local() {
            return Some("dummy-key".to_string());
        }
        None
    }

    /// Resolve the base URL: explicit override, then the provider default.
    pub fn resolve_base_url(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_base_url().map(str::to_string))
    }

    /// Map to the routed model string used in the request body, following
    /// the provider prefixing policy (§4.1).
    pub fn routed_model_name(&self) -> String {
        let model = self.model_id.as_str();
        match self.provider {
            // OpenAI-compatible passthrough endpoints: no prefix.
            Provider::OpenAi | Provider::Codestral | Provider::DeepSeek | Provider::LmStudio => {
                model.to_string()
            }
            Provider::Claude => format!("claude/{model}"),
            Provider::Gemini => format!("gemini/{model}"),
            Provider::Mistral => format!("mistral/{model}"),
            Provider::Ollama | Provider::Llama => format!("ollama/{model}"),
            Provider::Groq => route_groq(model),
            Provider::OpenRouter => route_openrouter(model),
        }
    }

    /// Whether the Ollama `num_predict` substitution for `max_tokens`
    /// applies to this provider.
    pub fn uses_num_predict(&self) -> bool {
        matches!(self.provider, Provider::Ollama | Provider::Llama)
    }
}

fn route_groq(model: &str) -> String {
    for prefix in GROQ_SPECIAL_PREFIXES {
        if model.starts_with(prefix) {
            return format!("groq/{model}");
        }
    }
    let bare = model.split_once('/').map(|(_, rest)| rest).unwrap_or(model);
    format!("groq/{bare}")
}

fn route_openrouter(model: &str) -> String {
    if model.contains('/') {
        return format!("openrouter/{model}");
    }
    let lower = model.to_ascii_lowercase();
    let namespaced = if lower.starts_with("gemini") {
        format!("google/{model}")
    } else if lower.starts_with("claude") {
        format!("anthropic/{model}")
    } else if lower.starts_with("mistral") || lower.starts_with("codestral") {
        format!("mistralai/{model}")
    } else if lower.starts_with("deepseek") {
        format!("deepseek/{model}")
    } else if lower.starts_with("gpt") || lower.starts_with("o3") {
        format!("openai/{model}")
    } else {
        model.to_string()
    };
    format!("openrouter/{namespaced}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_passthrough() {
        let spec = ModelSpec::new(Provider::OpenAi, "gpt-4o");
        assert_eq!(spec.routed_model_name(), "gpt-4o");
    }

    #[test]
    fn groq_plain_model_gets_prefixed() {
        let spec = ModelSpec::new(Provider::Groq, "llama-3.1-70b");
        assert_eq!(spec.routed_model_name(), "groq/llama-3.1-70b");
    }

    #[test]
    fn groq_special_prefix_kept_verbatim() {
        let spec = ModelSpec::new(Provider::Groq, "meta-llama/llama-guard-4-12b");
        assert_eq!(
            spec.routed_model_name(),
            "groq/meta-llama/llama-guard-4-12b"
        );
    }

    #[test]
    fn groq_strips_foreign_prefix() {
        let spec = ModelSpec::new(Provider::Groq, "vendor/custom-model");
        assert_eq!(spec.routed_model_name(), "groq/custom-model");
    }

    #[test]
    fn openrouter_infers_gemini_namespace() {
        let spec = ModelSpec::new(Provider::OpenRouter, "gemini-1.5-pro");
        assert_eq!(spec.routed_model_name(), "openrouter/google/gemini-1.5-pro");
    }

    #[test]
    fn openrouter_infers_claude_namespace() {
        let spec = ModelSpec::new(Provider::OpenRouter, "claude-3-opus");
        assert_eq!(
            spec.routed_model_name(),
            "openrouter/anthropic/claude-3-opus"
        );
    }

    #[test]
    fn openrouter_preserves_existing_namespace() {
        let spec = ModelSpec::new(Provider::OpenRouter, "mistralai/mixtral-8x7b");
        assert_eq!(
            spec.routed_model_name(),
            "openrouter/mistralai/mixtral-8x7b"
        );
    }

    #[test]
    fn openrouter_leaves_unknown_bare_model_as_is() {
        let spec = ModelSpec::new(Provider::OpenRouter, "some-custom-thing");
        assert_eq!(spec.routed_model_name(), "openrouter/some-custom-thing");
    }

    #[test]
    fn ollama_uses_num_predict() {
        let spec = ModelSpec::new(Provider::Ollama, "llama3");
        assert!(spec.uses_num_predict());
        assert_eq!(spec.resolve_base_url().as_deref(), Some("http://localhost:11434"));
    }

    #[test]
    fn local_providers_get_placeholder_key() {
        let spec = ModelSpec::new(Provider::LmStudio, "local-model");
        assert_eq!(spec.resolve_api_key().as_deref(), Some("dummy-key"));
    }

    #[test]
    fn parse_accepts_known_aliases() {
        assert_eq!(Provider::parse("Claude"), Some(Provider::Claude));
        assert_eq!(Provider::parse("anthropic"), Some(Provider::Claude));
        assert_eq!(Provider::parse("nonsense"), None);
    }
}
