//! Embedding generation for the vector-store facade (§4.3). When
//! `EMBEDDING_PROVIDER` is configured (mirroring the `{ROLE}_PROVIDER` /
//! `{ROLE}_MODEL` convention [`crate::agents`] resolves each agent slot
//! from), embeddings come from a real provider's `/embeddings` endpoint over
//! the same [`crate::llm::client::LlmClient`] request shape used for chat
//! completions. With nothing configured — or when a provider call fails —
//! embeddings fall back to deterministic feature hashing so `search_similar`
//! degrades instead of failing outright; this fallback is a last resort, not
//! a substitute for a configured provider, since cosine scores it produces
//! are meaningless against anything embedded by a real model.

use serde_json::{json, Value};

use crate::error::AppError;
use crate::llm::{ModelSpec, Provider};

/// Vector width used when no provider is configured and embeddings fall
/// back to feature hashing.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Known output width for the embedding models the facade is likely to be
/// pointed at. Unrecognized models fall back to [`DEFAULT_DIMENSIONS`];
/// backends that don't care about an exact match (Chroma computes its own)
/// tolerate this fine, but Qdrant/Milvus/pgvector collections are created
/// with this width and must stay consistent with whatever `embed` returns.
fn model_dimensions(model_id: &str) -> Option<usize> {
    match model_id {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "embed-english-v3.0" | "embed-multilingual-v3.0" => Some(1024),
        "nomic-embed-text" => Some(768),
        _ => None,
    }
}

fn resolve_embedding_spec() -> Option<ModelSpec> {
    let provider_str = std::env::var("EMBEDDING_PROVIDER").ok()?;
    let provider = Provider::parse(&provider_str)?;
    let model_id = std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "text-embedding-3-small".to_string());
    let mut spec = ModelSpec::new(provider, model_id);
    if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
        spec = spec.with_api_key(key);
    }
    if let Ok(base_url) = std::env::var("EMBEDDING_BASE_URL") {
        spec = spec.with_base_url(base_url);
    }
    Some(spec)
}

/// Embedding producer shared by every [`super::VectorStore`] backend,
/// mirroring how [`crate::agents::AgentPool`] hands out one [`ModelSpec`]
/// per role. One instance is built per process and cloned (cheaply, via
/// `Arc`) into each backend by [`super::registry::VectorStoreRegistry`].
pub struct EmbeddingService {
    http: reqwest::Client,
    spec: Option<ModelSpec>,
    dimensions: usize,
}

impl EmbeddingService {
    pub fn from_env(http: reqwest::Client) -> Self {
        let spec = resolve_embedding_spec();
        let dimensions = spec.as_ref().and_then(|s| model_dimensions(&s.model_id)).unwrap_or(DEFAULT_DIMENSIONS);
        Self { http, spec, dimensions }
    }

    /// Output width of whatever `embed` currently produces. Backends use
    /// this to size the collection they create rather than hardcoding
    /// [`DEFAULT_DIMENSIONS`].
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if let Some(spec) = &self.spec {
            match call_provider(&self.http, spec, text).await {
                Ok(vector) => return vector,
                Err(err) => {
                    tracing::warn!(error = %err, "embedding provider call failed, falling back to local feature hashing");
                }
            }
        }
        local_embed(text, self.dimensions)
    }
}

async fn call_provider(http: &reqwest::Client, spec: &ModelSpec, text: &str) -> Result<Vec<f32>, AppError> {
    let base_url = spec.resolve_base_url().unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
    let body = json!({
        "input": text,
        "model": spec.model_id,
        "encoding_format": "float",
    });

    let mut request = http.post(&url).json(&body);
    if let Some(key) = spec.resolve_api_key() {
        request = request.bearer_auth(key);
    }

    let response = request
        .send()
        .await
        .map_err(|e| AppError::ai_agent(format!("embedding request failed: {e}")))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::ai_agent(format!("embedding HTTP {status}: {body}")));
    }

    let payload: Value = response
        .json()
        .await
        .map_err(|e| AppError::ai_agent(format!("embedding response decode failed: {e}")))?;
    let values = payload["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| AppError::ai_agent("embedding response missing data[0].embedding".to_string()))?;
    let vector: Vec<f32> = values.iter().filter_map(Value::as_f64).map(|v| v as f32).collect();
    if vector.is_empty() {
        return Err(AppError::ai_agent("embedding response contained an empty vector".to_string()));
    }
    Ok(vector)
}

/// Deterministic feature-hashing embedding used when no provider is
/// configured, or as the last-resort degrade path when one is configured
/// but the call fails. Cosine similarity between two of these is still
/// meaningful relative to each other, just not comparable to a real model's
/// output.
fn local_embed(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = vec![0f32; dimensions];
    for token in text.split_whitespace() {
        let hash = fnv1a(token.as_bytes());
        let bucket = (hash as usize) % dimensions;
        let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
    normalize(&mut vector);
    vector
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_hashes_identically() {
        assert_eq!(local_embed("alameda county schools", DEFAULT_DIMENSIONS), local_embed("alameda county schools", DEFAULT_DIMENSIONS));
    }

    #[test]
    fn similarity_is_higher_for_overlapping_text() {
        let a = local_embed("how many schools are in alameda county", DEFAULT_DIMENSIONS);
        let b = local_embed("count schools in alameda county", DEFAULT_DIMENSIONS);
        let c = local_embed("total revenue for q3 financial report", DEFAULT_DIMENSIONS);
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[tokio::test]
    async fn falls_back_to_local_hash_without_a_configured_provider() {
        // SAFETY: no other test in this crate sets EMBEDDING_PROVIDER, so
        // clearing it here can't race a concurrent reader of the same var.
        unsafe {
            std::env::remove_var("EMBEDDING_PROVIDER");
        }
        let service = EmbeddingService::from_env(reqwest::Client::new());
        assert_eq!(service.dimensions(), DEFAULT_DIMENSIONS);
        let vector = service.embed("alameda county schools").await;
        assert_eq!(vector, local_embed("alameda county schools", DEFAULT_DIMENSIONS));
    }

    #[test]
    fn known_model_reports_its_real_dimension() {
        assert_eq!(model_dimensions("text-embedding-3-small"), Some(1536));
        assert_eq!(model_dimensions("unknown-model"), None);
    }
}
