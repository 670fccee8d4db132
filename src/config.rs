//! Layered settings: built-in defaults, then `config/mineral-rag.toml` if it
//! exists, then `MINERAL_RAG__SECTION__KEY` environment variables.

use std::path::PathBuf;

use config::{Config, Environment as EnvSource, File};
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::models::Environment;

pub const CONFIG_FILE: &str = "config/mineral-rag";
pub const ENV_PREFIX: &str = "MINERAL_RAG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub stores: StoresSettings,
    pub loader: LoaderSettings,
}

impl Settings {
    pub fn load() -> Result<Self, RagError> {
        dotenv::dotenv().ok();

        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(EnvSource::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedding.dimensions == 0 {
            return Err(RagError::Config("embedding.dimensions must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(RagError::Config("generation.temperature must be within [0, 2]".to_string()));
        }
        for env in Environment::ALL {
            let store = self.stores.get(env);
            if store.collection_prefix.trim().is_empty() {
                return Err(RagError::Config(format!("stores.{}.collection_prefix is empty", env)));
            }
        }
        let prod = self.stores.get(Environment::Production);
        let test = self.stores.get(Environment::Test);
        if prod.backend == test.backend && prod.path.is_some() && prod.path == test.path {
            return Err(RagError::Config(
                "test and production stores must not share a storage path".to_string(),
            ));
        }
        if prod.backend == StoreBackend::Qdrant
            && test.backend == StoreBackend::Qdrant
            && prod.qdrant_url == test.qdrant_url
            && prod.collection_prefix == test.collection_prefix
        {
            return Err(RagError::Config(
                "test and production stores must not share qdrant collections".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings for a hermetic test run rooted at `dir`.
    pub fn for_tests(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut settings = Settings::default();
        settings.stores.production.path = Some(dir.join("production"));
        settings.stores.test.path = Some(dir.join("test"));
        settings.loader.catalog_path = dir.join("minerals_catalog.json");
        settings
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Hash,
    Openai,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub dimensions: usize,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub model_dir: PathBuf,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hash,
            dimensions: 384,
            model: "text-embedding-3-small".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            timeout_ms: 10_000,
            model_dir: PathBuf::from("models/bge-small-en-v1.5"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub answer_language: String,
    pub mock_response: String,
    pub max_prompt_tokens: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:4000".to_string(),
            api_key: None,
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.1,
            timeout_ms: 30_000,
            answer_language: "Russian".to_string(),
            mock_response: "Mock answer: mineral information was found for your query. \
                            The production environment uses the configured language model."
                .to_string(),
            max_prompt_tokens: 6_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Snapshot directory for the local backend; `None` keeps it in memory.
    pub path: Option<PathBuf>,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_prefix: String,
}

impl StoreSettings {
    fn local(path: &str) -> Self {
        Self {
            backend: StoreBackend::Local,
            path: Some(PathBuf::from(path)),
            qdrant_url: "http://localhost:6334".to_string(),
            qdrant_api_key: None,
            collection_prefix: "openmineral".to_string(),
        }
    }

    /// Physical collection name, e.g. `openmineral_minerals`.
    pub fn collection_name(&self, kind: crate::models::CollectionKind) -> String {
        format!("{}_{}", self.collection_prefix, kind.as_str())
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::local("data/vector_store/production")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresSettings {
    pub production: StoreSettings,
    pub test: StoreSettings,
}

impl StoresSettings {
    pub fn get(&self, environment: Environment) -> &StoreSettings {
        match environment {
            Environment::Production => &self.production,
            Environment::Test => &self.test,
        }
    }
}

impl Default for StoresSettings {
    fn default() -> Self {
        Self {
            production: StoreSettings::local("data/vector_store/production"),
            test: StoreSettings::local("data/vector_store/test"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub catalog_path: PathBuf,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/minerals_catalog.json"),
        }
    }
}
