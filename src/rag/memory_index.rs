//! In-process vector index with optional JSON snapshots.
//!
//! Each collection lives behind its own `RwLock`; searches take read locks and
//! never block each other. When a directory is configured, every mutation
//! rewrites `<dir>/<collection>.json` via temp-file + rename.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::models::{CollectionMetadata, Document};
use crate::rag::filter::Filter;
use crate::rag::vector_store::{IndexHit, IndexedDocument, VectorIndex};

const SNAPSHOT_EXT: &str = "json";
const PROBE_FILE: &str = ".write-probe";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    document: Document,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionData {
    metadata: CollectionMetadata,
    dimensions: usize,
    entries: Vec<Entry>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl CollectionData {
    fn new(metadata: CollectionMetadata, dimensions: usize) -> Self {
        Self {
            metadata,
            dimensions,
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }

    fn emptied(&self) -> Self {
        Self::new(self.metadata.clone(), self.dimensions)
    }

    fn rebuild_positions(&mut self) {
        self.positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.document.id.clone(), pos))
            .collect();
    }
}

type SharedCollection = Arc<RwLock<CollectionData>>;

pub struct MemoryIndex {
    root: Option<PathBuf>,
    collections: RwLock<HashMap<String, SharedCollection>>,
}

impl MemoryIndex {
    /// Opens an index rooted at `root`, creating the directory and verifying
    /// it is writable. `None` keeps everything in memory.
    pub fn open(root: Option<PathBuf>) -> std::io::Result<Self> {
        if let Some(ref dir) = root {
            prepare_dir(dir)?;
        }
        Ok(Self {
            root,
            collections: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn snapshot_path(&self, collection: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", collection, SNAPSHOT_EXT)))
    }

    async fn collection(&self, name: &str) -> Result<SharedCollection> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RagError::Index(format!("collection '{}' does not exist", name)))
    }

    async fn persist(&self, data: &CollectionData) -> Result<()> {
        let Some(path) = self.snapshot_path(&data.metadata.name) else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(data).map_err(|e| RagError::Index(format!("encode snapshot: {}", e)))?;
        let tmp_path = path.with_extension(format!("{}.tmp", SNAPSHOT_EXT));

        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(
            "Saved collection '{}' ({} documents, {} bytes)",
            data.metadata.name,
            data.entries.len(),
            bytes.len()
        );
        Ok(())
    }

    async fn load_snapshot(path: &Path) -> Result<CollectionData> {
        let raw = tokio::fs::read(path).await?;
        let mut data: CollectionData =
            serde_json::from_slice(&raw).map_err(|e| RagError::Index(format!("snapshot {:?}: {}", path, e)))?;

        if let Some(bad) = data.entries.iter().find(|e| e.vector.len() != data.dimensions) {
            return Err(RagError::Index(format!(
                "snapshot {:?} holds a {}-dim vector for '{}', expected {}",
                path,
                bad.vector.len(),
                bad.document.id,
                data.dimensions
            )));
        }
        data.rebuild_positions();

        tracing::info!(
            "Loaded collection '{}' ({} documents)",
            data.metadata.name,
            data.entries.len()
        );
        Ok(data)
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn ensure_collection(&self, metadata: &CollectionMetadata, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&metadata.name) {
            return Ok(());
        }

        let data = match self.snapshot_path(&metadata.name) {
            Some(path) if tokio::fs::try_exists(&path).await? => {
                let data = Self::load_snapshot(&path).await?;
                if data.dimensions != dimensions {
                    return Err(RagError::Index(format!(
                        "collection '{}' was built with {} dimensions, embedder produces {}",
                        metadata.name, data.dimensions, dimensions
                    )));
                }
                data
            }
            _ => {
                let data = CollectionData::new(metadata.clone(), dimensions);
                self.persist(&data).await?;
                tracing::info!("Created collection '{}'", metadata.name);
                data
            }
        };

        collections.insert(metadata.name.clone(), Arc::new(RwLock::new(data)));
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()> {
        let shared = self.collection(collection).await?;
        let mut data = shared.write().await;

        if let Some(bad) = documents.iter().find(|d| d.vector.len() != data.dimensions) {
            return Err(RagError::Index(format!(
                "vector for '{}' has {} dimensions, collection '{}' expects {}",
                bad.document.id,
                bad.vector.len(),
                collection,
                data.dimensions
            )));
        }

        // readers keep seeing the old state until the snapshot is on disk
        let mut staged = data.clone();
        for indexed in documents {
            let entry = Entry {
                document: indexed.document,
                vector: indexed.vector,
            };
            match staged.positions.get(&entry.document.id).copied() {
                Some(pos) => staged.entries[pos] = entry,
                None => {
                    let pos = staged.entries.len();
                    staged.positions.insert(entry.document.id.clone(), pos);
                    staged.entries.push(entry);
                }
            }
        }

        self.persist(&staged).await?;
        *data = staged;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let shared = self.collection(collection).await?;
        let data = shared.read().await;
        Ok(data.entries.len())
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Document>> {
        let shared = self.collection(collection).await?;
        let data = shared.read().await;
        Ok(data.entries.iter().map(|e| e.document.clone()).collect())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize, filter: &Filter) -> Result<Vec<IndexHit>> {
        let shared = self.collection(collection).await?;
        let data = shared.read().await;

        let mut scored: Vec<(usize, f32)> = data
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter.matches(&entry.document.attributes))
            .map(|(pos, entry)| (pos, cosine_distance(vector, &entry.vector)))
            .collect();

        // stable: equal distances keep insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(pos, distance)| IndexHit {
                document: data.entries[pos].document.clone(),
                distance,
            })
            .collect())
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        let shared = self.collection(collection).await?;
        let mut data = shared.write().await;
        let emptied = data.emptied();
        self.persist(&emptied).await?;
        *data = emptied;
        tracing::info!("Cleared collection '{}'", collection);
        Ok(())
    }

    async fn reset_storage(&self) -> Result<()> {
        let Some(ref dir) = self.root else {
            return Ok(());
        };

        // collections stay registered; their write locks keep readers out
        // while the directory is rebuilt
        let collections = self.collections.read().await;
        let mut guards = Vec::with_capacity(collections.len());
        for shared in collections.values() {
            guards.push(shared.write().await);
        }

        if tokio::fs::try_exists(dir).await? {
            tokio::fs::remove_dir_all(dir).await?;
        }
        prepare_dir(dir)?;
        for data in &guards {
            self.persist(data).await?;
        }
        tracing::info!("Storage at {} rebuilt ({} collections)", dir.display(), guards.len());
        Ok(())
    }
}

fn prepare_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(PROBE_FILE);
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)
}

/// `1 - cos(a, b)`; zero vectors sit at distance 1.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
