#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mineral_rag::rag::embeddings::{build_embedder, Embedder};
use mineral_rag::rag::generation::Generator;
use mineral_rag::{BulkLoader, RagEngine, Settings, StoreRegistry};

pub fn settings(dir: &Path) -> Settings {
    Settings::for_tests(dir)
}

pub fn registry(dir: &Path) -> Arc<StoreRegistry> {
    let settings = settings(dir);
    let embedder = build_embedder(&settings.embedding).unwrap();
    Arc::new(StoreRegistry::new(Arc::new(settings), embedder))
}

pub fn registry_with(settings: Settings, embedder: Arc<dyn Embedder>) -> Arc<StoreRegistry> {
    Arc::new(StoreRegistry::new(Arc::new(settings), embedder))
}

pub fn loader(registry: &Arc<StoreRegistry>) -> BulkLoader {
    let catalog_path = registry.settings().loader.catalog_path.clone();
    BulkLoader::new(registry.clone(), catalog_path)
}

pub fn engine(registry: &Arc<StoreRegistry>, generator: Arc<dyn Generator>) -> RagEngine {
    RagEngine::new(registry.clone(), generator, registry.settings().generation.clone())
}

/// Generator double that records how often it was called.
pub struct CountingGenerator {
    calls: AtomicUsize,
    reply: Result<String, String>,
    delay: Duration,
}

impl CountingGenerator {
    pub fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Ok(reply.to_string()),
            delay: Duration::ZERO,
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Ok("late".to_string()),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    fn model_id(&self) -> &str {
        "stub-model"
    }

    async fn generate(&self, _prompt: &str, _temperature: f32) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone().map_err(|e| anyhow::anyhow!(e))
    }
}

/// Embedder double that fails, optionally after a delay.
pub struct BrokenEmbedder {
    pub dimensions: usize,
    pub delay: Duration,
}

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model_id(&self) -> &str {
        "broken"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        anyhow::bail!("embedding service is down")
    }
}
