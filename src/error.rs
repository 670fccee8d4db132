use crate::models::{CollectionKind, Environment, SearchResponse};

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("vector store initialization failed ({environment}): {message}")]
    StoreInit {
        environment: Environment,
        message: String,
    },
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),
    #[error("generation failed: {message}")]
    GenerationFailed {
        message: String,
        retrieval: Box<SearchResponse>,
    },
    #[error("operation cancelled by caller")]
    Cancelled,
    #[error("vector index error: {0}")]
    Index(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("bulk load incomplete, failed domains: {failed:?}")]
    LoaderPartialFailure { failed: Vec<CollectionKind> },
    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Stable identifier surfaced in the response envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::StoreInit { .. } => "store_init_error",
            RagError::UnknownCollection(_) => "unknown_collection",
            RagError::InvalidQuery(_) => "invalid_query",
            RagError::InvalidDocument(_) => "invalid_document",
            RagError::InvalidOperation(_) => "invalid_operation",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::GenerationFailed { .. } => "generation_failed",
            RagError::Cancelled => "cancelled",
            RagError::Index(_) => "index_error",
            RagError::Catalog(_) => "catalog_error",
            RagError::LoaderPartialFailure { .. } => "loader_partial_failure",
            RagError::Config(_) => "config_error",
        }
    }
}

impl From<qdrant_client::QdrantError> for RagError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        RagError::Index(err.to_string())
    }
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Index(err.to_string())
    }
}

impl From<config::ConfigError> for RagError {
    fn from(err: config::ConfigError) -> Self {
        RagError::Config(err.to_string())
    }
}
