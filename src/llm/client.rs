use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::AppError;

use super::routing::ModelSpec;

/// A single chat message in the OpenAI-style `{role, content}` shape every
/// provider in the facade ultimately speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub extras: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Provider/model/attempt-tagged failure, surfaced to callers as an
/// `AppError { category: AiAgent }`.
#[derive(Debug, Clone)]
pub struct LlmError {
    pub provider: String,
    pub model: String,
    pub attempt: u32,
    pub message: String,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LLM call failed (provider={}, model={}, attempt={}): {}",
            self.provider, self.model, self.attempt, self.message
        )
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        AppError::ai_agent(err.to_string()).with_context("provider", err.provider.clone())
    }
}

/// Unified client over every configured provider family. One instance is
/// constructed per [`ModelSpec`] (i.e. per agent slot); it is cheap to clone
/// since it only wraps a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    spec: ModelSpec,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, spec: ModelSpec) -> Self {
        Self { http, spec }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// `generate(messages, {max_tokens?, temperature?, extras}) -> {content, model, usage?}`.
    pub async fn generate(
        &self,
        messages: Vec<Message>,
        options: GenerateOptions,
    ) -> Result<LlmResponse, LlmError> {
        let model_name = self.spec.routed_model_name();
        let base_url = self.spec.resolve_base_url().unwrap_or_else(|| {
            "https://api.openai.com/v1".to_string()
        });
        let api_key = self.spec.resolve_api_key();

        let mut body = json!({
            "model": model_name,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.spec.temperature),
        });

        if let Some(max_tokens) = options.max_tokens {
            if self.spec.uses_num_predict() {
                body["options"] = json!({ "num_predict": max_tokens });
            } else {
                body["max_tokens"] = json!(max_tokens);
            }
        }

        if let Value::Object(map) = &mut body {
            for (k, v) in options.extras {
                map.insert(k, v);
            }
        }

        let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        let mut request = self.http.post(&url).json(&body);
        if let Some(key) = &api_key {
            request = request.bearer_auth(key);
        }

        let to_err = |message: String| LlmError {
            provider: format!("{:?}", self.spec.provider),
            model: model_name.clone(),
            attempt: 1,
            message,
        };

        let response = request.send().await.map_err(|e| to_err(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(to_err(format!("HTTP {status}: {text}")));
        }

        let payload: Value = response.json().await.map_err(|e| to_err(e.to_string()))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| to_err("response missing choices[0].message.content".to_string()))?
            .to_string();

        let usage = payload.get("usage").and_then(|u| {
            Some(Usage {
                prompt_tokens: u.get("prompt_tokens")?.as_u64()?,
                completion_tokens: u.get("completion_tokens")?.as_u64()?,
                total_tokens: u.get("total_tokens")?.as_u64()?,
            })
        });

        Ok(LlmResponse {
            content,
            model: payload["model"].as_str().unwrap_or(&model_name).to_string(),
            usage,
        })
    }

    /// Approximate token count (1 token ~= 4 characters), mirroring the
    /// fallback used whenever the provider doesn't expose a tokenizer.
    pub fn count_tokens(&self, text: &str) -> usize {
        text.len().div_ceil(4)
    }
}
