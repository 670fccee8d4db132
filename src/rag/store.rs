//! Per-environment collection stores and the registry that memoizes them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tokio_util::sync::CancellationToken;

use crate::config::{Settings, StoreBackend, StoreSettings};
use crate::error::{RagError, Result};
use crate::models::{
    AddDocumentResult, Attributes, CollectionKind, CollectionMetadata, Document, Environment, NewDocument,
};
use crate::rag::embeddings::Embedder;
use crate::rag::memory_index::MemoryIndex;
use crate::rag::vector_store::{IndexedDocument, QdrantIndex, VectorIndex};
use crate::rag::{bounded, Interrupted};

pub const ADD_DOCUMENT_SOURCE: &str = "api_add_document";

struct CollectionHandle {
    metadata: CollectionMetadata,
    write_lock: Mutex<()>,
}

/// The three collections of one environment on top of a vector index.
pub struct CollectionStore {
    environment: Environment,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    embed_timeout: Duration,
    handles: Vec<CollectionHandle>,
}

impl CollectionStore {
    /// Connects the configured backend and creates the collections if needed.
    pub async fn open(
        environment: Environment,
        settings: &StoreSettings,
        embedder: Arc<dyn Embedder>,
        embed_timeout: Duration,
    ) -> Result<Self> {
        tracing::info!(
            "Opening {} store for {} environment",
            match settings.backend {
                StoreBackend::Local => "local",
                StoreBackend::Qdrant => "qdrant",
            },
            environment
        );

        let index: Arc<dyn VectorIndex> = match settings.backend {
            StoreBackend::Local => {
                let index = MemoryIndex::open(settings.path.clone()).map_err(|e| RagError::StoreInit {
                    environment,
                    message: format!("storage path {:?} is not usable: {}", settings.path, e),
                })?;
                Arc::new(index)
            }
            StoreBackend::Qdrant => Arc::new(QdrantIndex::connect(settings, environment).await?),
        };

        Self::with_index(environment, settings, index, embedder, embed_timeout).await
    }

    /// Builds a store over an already constructed index.
    pub async fn with_index(
        environment: Environment,
        settings: &StoreSettings,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        embed_timeout: Duration,
    ) -> Result<Self> {
        let handles = CollectionKind::ALL
            .iter()
            .map(|kind| CollectionHandle {
                metadata: CollectionMetadata::new(*kind, settings.collection_name(*kind), environment),
                write_lock: Mutex::new(()),
            })
            .collect();

        let store = Self {
            environment,
            index,
            embedder,
            embed_timeout,
            handles,
        };

        store.ensure_collections().await.map_err(|e| match e {
            RagError::StoreInit { .. } => e,
            other => RagError::StoreInit {
                environment,
                message: other.to_string(),
            },
        })?;

        tracing::info!(
            "{} store ready ({} backend, {} collections)",
            environment,
            store.index.backend_name(),
            store.handles.len()
        );
        Ok(store)
    }

    async fn ensure_collections(&self) -> Result<()> {
        let dimensions = self.embedder.dimensions();
        for handle in &self.handles {
            self.index.ensure_collection(&handle.metadata, dimensions).await?;
        }
        Ok(())
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embed_timeout(&self) -> Duration {
        self.embed_timeout
    }

    /// Metadata of the three collections, for diagnostics.
    pub fn collections(&self) -> Vec<&CollectionMetadata> {
        self.handles.iter().map(|h| &h.metadata).collect()
    }

    fn handle(&self, kind: CollectionKind) -> &CollectionHandle {
        // handles are built from CollectionKind::ALL
        &self.handles[kind as usize]
    }

    pub fn collection_name(&self, kind: CollectionKind) -> &str {
        &self.handle(kind).metadata.name
    }

    /// Embeds `texts` under the store's timeout, racing `cancel`.
    pub async fn embed(&self, texts: &[String], cancel: &CancellationToken) -> Result<Vec<Vec<f32>>> {
        let vectors = match bounded(self.embed_timeout, cancel, self.embedder.embed(texts)).await {
            Ok(Ok(vectors)) => vectors,
            Ok(Err(e)) => {
                tracing::error!("Embedding failed: {}", e);
                return Err(RagError::EmbeddingUnavailable(e.to_string()));
            }
            Err(Interrupted::TimedOut) => {
                tracing::error!("Embedding timed out after {:?}", self.embed_timeout);
                return Err(RagError::EmbeddingUnavailable(format!(
                    "timed out after {} ms",
                    self.embed_timeout.as_millis()
                )));
            }
            Err(Interrupted::Cancelled) => return Err(RagError::Cancelled),
        };

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "expected {} vectors, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let expected = self.embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(RagError::EmbeddingUnavailable(format!(
                "embedder returned {} dimensions, expected {}",
                bad.len(),
                expected
            )));
        }
        Ok(vectors)
    }

    /// Adds one caller-supplied document and returns the collection's new size.
    pub async fn add_document(
        &self,
        collection: &str,
        text: &str,
        attributes: JsonMap<String, JsonValue>,
        id: Option<String>,
    ) -> Result<AddDocumentResult> {
        let kind: CollectionKind = collection.parse()?;
        let now = Utc::now();

        let mut attributes = attributes;
        attributes.insert("added_at".to_string(), JsonValue::String(now.to_rfc3339()));
        attributes.insert("source".to_string(), JsonValue::String(ADD_DOCUMENT_SOURCE.to_string()));
        if self.environment.is_test() {
            attributes.insert("test_mode".to_string(), JsonValue::Bool(true));
        }

        let document = self.prepare(kind, NewDocument { id, text: text.to_string(), attributes }, now)?;
        let document_id = document.id.clone();

        let vectors = self
            .embed(std::slice::from_ref(&document.text), &CancellationToken::new())
            .await?;

        let handle = self.handle(kind);
        let new_count = {
            let _guard = handle.write_lock.lock().await;
            self.index
                .upsert(&handle.metadata.name, pair(vec![document], vectors))
                .await?;
            self.index.count(&handle.metadata.name).await?
        };

        tracing::info!(
            "Added document {} to {} ({} environment, {} documents)",
            document_id,
            kind,
            self.environment,
            new_count
        );

        Ok(AddDocumentResult {
            collection: kind,
            document_id,
            new_count,
            test_mode: self.environment.is_test(),
        })
    }

    /// Batch upsert used by the bulk loader. Returns the number written.
    pub async fn load_documents(&self, kind: CollectionKind, documents: Vec<NewDocument>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let loaded_at = Utc::now();
        let documents = documents
            .into_iter()
            .map(|doc| self.prepare(kind, doc, loaded_at))
            .collect::<Result<Vec<_>>>()?;

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embed(&texts, &CancellationToken::new()).await?;
        let written = documents.len();

        let handle = self.handle(kind);
        let _guard = handle.write_lock.lock().await;
        self.index
            .upsert(&handle.metadata.name, pair(documents, vectors))
            .await?;

        tracing::info!("Loaded {} documents into {} ({})", written, kind, self.environment);
        Ok(written)
    }

    fn prepare(&self, kind: CollectionKind, doc: NewDocument, loaded_at: DateTime<Utc>) -> Result<Document> {
        if doc.text.trim().is_empty() {
            return Err(RagError::InvalidDocument("document text must not be empty".to_string()));
        }

        let id = match doc.id {
            Some(id) if id.trim().is_empty() => {
                return Err(RagError::InvalidDocument("document id must not be blank".to_string()));
            }
            Some(id) => id,
            None => generate_id(kind),
        };

        Ok(Document {
            id,
            text: doc.text,
            attributes: Attributes::from_map(doc.attributes, self.environment, loaded_at)?,
        })
    }

    pub async fn count(&self, kind: CollectionKind) -> Result<usize> {
        self.index.count(self.collection_name(kind)).await
    }

    pub async fn get_all(&self, kind: CollectionKind) -> Result<Vec<Document>> {
        self.index.get_all(self.collection_name(kind)).await
    }

    /// Empties every collection and rebuilds its storage. Only the test
    /// environment may be purged.
    pub async fn purge(&self) -> Result<()> {
        if !self.environment.is_test() {
            tracing::warn!("Refusing to purge the {} environment", self.environment);
            return Err(RagError::InvalidOperation(format!(
                "purge is only allowed for the test environment, not {}",
                self.environment
            )));
        }

        let _guards: Vec<MutexGuard<'_, ()>> = {
            let mut guards = Vec::with_capacity(self.handles.len());
            for handle in &self.handles {
                guards.push(handle.write_lock.lock().await);
            }
            guards
        };

        // collections are emptied in place so concurrent readers never see
        // one missing
        for handle in &self.handles {
            self.index.clear(&handle.metadata.name).await?;
        }
        self.index.reset_storage().await?;

        tracing::info!("Test environment purged");
        Ok(())
    }
}

fn pair(documents: Vec<Document>, vectors: Vec<Vec<f32>>) -> Vec<IndexedDocument> {
    documents
        .into_iter()
        .zip(vectors)
        .map(|(document, vector)| IndexedDocument { document, vector })
        .collect()
}

/// `<domain tag>_<8 hex chars>`, e.g. `deal_3fa85f64`.
pub fn generate_id(kind: CollectionKind) -> String {
    format!("{}_{}", kind.id_prefix(), hex::encode(rand::random::<[u8; 4]>()))
}

/// One lazily opened store per environment.
pub struct StoreRegistry {
    settings: Arc<Settings>,
    embedder: Arc<dyn Embedder>,
    production: OnceCell<Arc<CollectionStore>>,
    test: OnceCell<Arc<CollectionStore>>,
}

impl StoreRegistry {
    pub fn new(settings: Arc<Settings>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            settings,
            embedder,
            production: OnceCell::new(),
            test: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Returns the store for `environment`, opening it on first use. A failed
    /// open is not cached.
    pub async fn open_store(&self, environment: Environment) -> Result<Arc<CollectionStore>> {
        let cell = match environment {
            Environment::Production => &self.production,
            Environment::Test => &self.test,
        };

        cell.get_or_try_init(|| async {
            let store = CollectionStore::open(
                environment,
                self.settings.stores.get(environment),
                self.embedder.clone(),
                Duration::from_millis(self.settings.embedding.timeout_ms),
            )
            .await?;
            Ok::<_, RagError>(Arc::new(store))
        })
        .await
        .cloned()
    }

    /// Purges the store for `environment`; production is refused.
    pub async fn purge(&self, environment: Environment) -> Result<()> {
        if !environment.is_test() {
            return Err(RagError::InvalidOperation(format!(
                "purge is only allowed for the test environment, not {}",
                environment
            )));
        }
        self.open_store(environment).await?.purge().await
    }
}
