use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{EmbeddingProvider, EmbeddingSettings};
use crate::error::RagError;

static TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").unwrap());

/// Text → fixed-dimension vector. Implementations must return one vector per
/// input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, RagError> {
    match settings.provider {
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(settings.dimensions))),
        EmbeddingProvider::Openai => Ok(Arc::new(HttpEmbedder::new(settings)?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProvider::Local => Ok(Arc::new(
            local::LocalModelEmbedder::new(settings).map_err(|e| RagError::Config(e.to_string()))?,
        )),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProvider::Local => Err(RagError::Config(
            "embedding provider 'local' requires the `local-embeddings` feature".to_string(),
        )),
    }
}

/// Deterministic bag-of-words feature hashing. Needs no model files or
/// network, so it is the default provider and the one tests run against.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in TOKEN_PATTERN.find_iter(text) {
            let token = token.as_str().to_lowercase();
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % self.dimensions;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        "feature-hash"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| RagError::Config(format!("embedding client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/embeddings", settings.api_base.trim_end_matches('/')),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dimensions,
        });

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("Embedding request failed: {} - {}", status, error_text);
        }

        let json: Value = response.json().await?;
        let vectors = parse_embedding_response(json)?;
        if vectors.len() != texts.len() {
            anyhow::bail!("Embedding response has {} vectors for {} inputs", vectors.len(), texts.len());
        }
        Ok(vectors)
    }
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("Embedding response is missing data array"))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(fallback_index);
        let embedding = item
            .get("embedding")
            .and_then(|v| v.as_array())
            .ok_or_else(|| anyhow::anyhow!("Embedding item missing embedding array"))?;
        let mut vec = Vec::with_capacity(embedding.len());
        for value in embedding {
            let number = value
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("Embedding value must be numeric"))?;
            vec.push(number as f32);
        }
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[cfg(feature = "local-embeddings")]
mod local {
    use anyhow::Result;
    use async_trait::async_trait;
    use fastembed::{InitOptionsUserDefined, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel};

    use super::Embedder;
    use crate::config::EmbeddingSettings;

    /// ONNX sentence-embedding model read from a local directory.
    pub struct LocalModelEmbedder {
        model: TextEmbedding,
        model_id: String,
        dimensions: usize,
    }

    impl LocalModelEmbedder {
        pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
            let model_dir = settings.model_dir.as_path();
            tracing::info!("Initializing embedding model from {}", model_dir.display());

            if !model_dir.exists() {
                anyhow::bail!("Model directory not found: {}", model_dir.display());
            }

            let read = |name: &str| {
                std::fs::read(model_dir.join(name)).map_err(|e| anyhow::anyhow!("Failed to read {}: {}", name, e))
            };

            let user_model = UserDefinedEmbeddingModel {
                onnx_file: read("model.onnx")?,
                tokenizer_files: TokenizerFiles {
                    tokenizer_file: read("tokenizer.json")?,
                    config_file: read("config.json")?,
                    special_tokens_map_file: read("special_tokens_map.json")?,
                    tokenizer_config_file: read("tokenizer_config.json")?,
                },
            };

            let model = TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
                .map_err(|e| anyhow::anyhow!("Failed to initialize embedding model: {}", e))?;

            tracing::info!("Embedding model initialized successfully");
            Ok(Self {
                model,
                model_id: settings.model.clone(),
                dimensions: settings.dimensions,
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalModelEmbedder {
        fn model_id(&self) -> &str {
            &self.model_id
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let embeddings = self.model.embed(texts.to_vec(), None)?;
            Ok(embeddings)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_embedding_is_normalized_and_deterministic() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_one("Copper wiring and construction");
        let b = embedder.embed_one("copper WIRING and construction");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_embed_batch_keeps_input_order() {
        let embedder = HashEmbedder::new(32);
        let texts = vec!["gold".to_string(), "nickel".to_string()];
        let vectors = tokio_test::block_on(embedder.embed(&texts)).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embedder.embed_one("gold"));
        assert_eq!(vectors[1], embedder.embed_one("nickel"));
    }

    #[test]
    fn test_hash_embedding_of_empty_text_is_zero() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_one("  ...  ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_one("lithium battery");
        let close = embedder.embed_one("lithium is a battery material for EV");
        let far = embedder.embed_one("gold jewelry investment hedge");
        assert!(cosine(&query, &close) > cosine(&query, &far));
    }

    #[test]
    fn test_parses_embeddings_in_index_order() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [2.0, 3.0] },
                { "index": 0, "embedding": [0.5, 1.5] }
            ]
        });
        let parsed = parse_embedding_response(json).unwrap();
        assert_eq!(parsed, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
    }

    #[tokio::test]
    async fn test_build_embedder_defaults_to_hash() {
        let settings = EmbeddingSettings::default();
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.model_id(), "feature-hash");
        let vectors = embedder.embed(&["copper".to_string()]).await.unwrap();
        assert_eq!(vectors[0].len(), settings.dimensions);
    }
}
