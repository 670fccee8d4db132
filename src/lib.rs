pub mod config;
pub mod error;
pub mod loader;
pub mod models;
pub mod rag;
pub mod routes;

pub use config::Settings;
pub use error::{RagError, Result};
pub use loader::{BulkLoader, LoadReport};
pub use rag::store::{CollectionStore, StoreRegistry};
pub use rag::RagEngine;

/// Installs the `tracing` subscriber shared by both binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mineral_rag=info,tower_http=info".into()),
        )
        .init();
}
