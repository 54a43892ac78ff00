use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use veritas_core::config::EmbeddingConfig;
use veritas_core::error::{Result, VeritasError};

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts into vectors.
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
    /// Number of dimensions in the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Pick an embedder from `[embedding]`, or the local hashing embedder when unset.
pub fn create_embedder(config: Option<&EmbeddingConfig>) -> Result<Arc<dyn EmbeddingProvider>> {
    let Some(config) = config else {
        return Ok(Arc::new(HashingEmbedder::default()));
    };

    let base_url = match (config.provider.as_str(), config.base_url.as_deref()) {
        ("local", _) => return Ok(Arc::new(HashingEmbedder::new(config.dimensions))),
        (_, Some(url)) => url.to_string(),
        ("openai", None) => "https://api.openai.com/v1".to_string(),
        ("ollama", None) => "http://localhost:11434/v1".to_string(),
        (other, None) => {
            return Err(VeritasError::Config(format!(
                "embedding.base_url is required for provider '{}'",
                other
            )))
        }
    };
    if config.model.is_empty() {
        return Err(VeritasError::Config("embedding.model must be set".into()));
    }

    Ok(Arc::new(HttpEmbeddingProvider::new(
        &base_url,
        config.api_key.as_deref(),
        &config.model,
        config.dimensions,
    )))
}

/// Client for an OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama, vLLM).
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str, dims: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            api_key: api_key.map(String::from),
            model: model.to_string(),
            dims,
        }
    }

    async fn request(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let count = texts.len();
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "model": self.model, "input": texts }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| {
            VeritasError::Embedding(format!("request to {} failed: {}", self.endpoint, e))
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail: String = body.chars().take(200).collect();
            return Err(VeritasError::Embedding(format!(
                "{} returned {}: {}",
                self.endpoint, status, detail
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| VeritasError::Embedding(format!("unreadable response: {}", e)))?;
        debug!(model = %self.model, count, "Embeddings received");
        parse_embeddings(body, count, self.dims)
    }
}

/// Vectors from an `{"data": [{"index", "embedding"}, ..]}` body, in input order.
///
/// The row count must match the number of inputs and every vector must have
/// `dims` components.
fn parse_embeddings(body: Value, count: usize, dims: usize) -> Result<Vec<Vec<f32>>> {
    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| VeritasError::Embedding("response has no 'data' field".into()))?;
    let mut rows: Vec<EmbeddingRow> = serde_json::from_value(data)
        .map_err(|e| VeritasError::Embedding(format!("malformed 'data': {}", e)))?;

    if rows.len() != count {
        return Err(VeritasError::Embedding(format!(
            "expected {} vectors, got {}",
            count,
            rows.len()
        )));
    }
    rows.sort_by_key(|row| row.index);

    rows.into_iter()
        .map(|row| {
            if row.embedding.len() == dims {
                Ok(row.embedding)
            } else {
                Err(VeritasError::Embedding(format!(
                    "vector {} has {} dimensions, configured for {}",
                    row.index,
                    row.embedding.len(),
                    dims
                )))
            }
        })
        .collect()
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(self.request(texts))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Offline embedder: signed feature hashing of word unigrams and bigrams.
///
/// Deterministic across runs, so vectors written by one process can be queried
/// by another without any model.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let mut add = |feature: &str, weight: f32| {
            let h = fnv1a(feature.as_bytes());
            let idx = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign * weight;
        };

        for token in &tokens {
            add(token, 1.0);
        }
        for pair in tokens.windows(2) {
            add(&format!("{} {}", pair[0], pair[1]), 0.5);
        }

        let norm = dot(&vector, &vector).sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.embed_one(t)).collect();
        Box::pin(async move { Ok(vectors) })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine of the angle between `a` and `b`; 0.0 for mismatched lengths or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let norms = dot(a, a).sqrt() * dot(b, b).sqrt();
    if norms > 0.0 {
        dot(a, b) / norms
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal_and_mismatched() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("Quantum error correction codes");
        let b = embedder.embed_one("quantum ERROR correction, codes!");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(embedder.embed_one("").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hashing_embedder_ranks_related_text_higher() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed_one("qubit superposition and entanglement");
        let related = embedder.embed_one("entanglement links the superposition of each qubit");
        let unrelated = embedder.embed_one("sourdough bread needs a long cold fermentation");
        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hashing_embedder_batch() {
        let embedder = HashingEmbedder::new(32);
        let texts = vec!["first page".to_string(), "second page".to_string()];
        let vectors = embedder.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1], embedder.embed_one("second page"));
    }

    #[test]
    fn test_parse_embeddings_orders_by_index() {
        let body = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embeddings(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_embeddings_rejects_bad_shapes() {
        let wrong_dims = json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0, 0.0] }] });
        let err = parse_embeddings(wrong_dims, 1, 2).unwrap_err();
        assert!(matches!(err, VeritasError::Embedding(_)));
        assert!(err.to_string().contains("3 dimensions"));

        let short = json!({ "data": [{ "embedding": [1.0, 0.0] }] });
        let err = parse_embeddings(short, 2, 2).unwrap_err();
        assert!(err.to_string().contains("expected 2 vectors, got 1"));

        let err = parse_embeddings(json!({ "error": "model not found" }), 1, 2).unwrap_err();
        assert!(err.to_string().contains("no 'data' field"));
    }

    #[test]
    fn test_create_embedder() {
        assert_eq!(create_embedder(None).unwrap().dimensions(), 384);

        let config = EmbeddingConfig {
            provider: "ollama".into(),
            model: "nomic-embed-text".into(),
            base_url: None,
            api_key: None,
            dimensions: 768,
        };
        assert_eq!(create_embedder(Some(&config)).unwrap().dimensions(), 768);

        let config = EmbeddingConfig {
            provider: "custom".into(),
            ..config
        };
        assert!(create_embedder(Some(&config)).is_err());
    }
}
