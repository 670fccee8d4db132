pub mod catalog;
pub mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{RagError, Result};
use crate::models::{CollectionKind, Environment, NewDocument};
use crate::rag::store::StoreRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainOutcome {
    pub collection: CollectionKind,
    pub loaded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DomainOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadReport {
    pub environment: Environment,
    pub success: bool,
    pub domains: Vec<DomainOutcome>,
}

impl LoadReport {
    pub fn total_loaded(&self) -> usize {
        self.domains.iter().map(|d| d.loaded).sum()
    }

    pub fn failed(&self) -> Vec<CollectionKind> {
        self.domains
            .iter()
            .filter(|d| !d.succeeded())
            .map(|d| d.collection)
            .collect()
    }

    /// Turns a partial load into `LoaderPartialFailure`.
    pub fn ensure_complete(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(RagError::LoaderPartialFailure { failed: self.failed() })
        }
    }
}

/// Seeds an environment's collections from the catalog file and the
/// built-in reference data.
pub struct BulkLoader {
    registry: Arc<StoreRegistry>,
    catalog_path: PathBuf,
}

impl BulkLoader {
    pub fn new(registry: Arc<StoreRegistry>, catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            catalog_path: catalog_path.into(),
        }
    }

    /// Test: the built-in minerals. Production: the catalog file, or the
    /// built-in minerals when the file does not exist.
    pub async fn load_catalog(&self, environment: Environment) -> Result<usize> {
        let documents = if environment.is_test() {
            fixtures::minerals()
        } else {
            match catalog::read_catalog(&self.catalog_path).await? {
                Some(documents) => {
                    tracing::info!(
                        "Read {} minerals from {}",
                        documents.len(),
                        self.catalog_path.display()
                    );
                    documents
                }
                None => {
                    tracing::warn!(
                        "Catalog {} not found, using built-in minerals",
                        self.catalog_path.display()
                    );
                    fixtures::minerals()
                }
            }
        };
        self.load(environment, CollectionKind::Minerals, documents).await
    }

    pub async fn load_deals(&self, environment: Environment) -> Result<usize> {
        let mut documents = fixtures::deals();
        if !environment.is_test() {
            documents.extend(fixtures::production_deals());
        }
        self.load(environment, CollectionKind::Deals, documents).await
    }

    pub async fn load_kyc(&self, environment: Environment) -> Result<usize> {
        let mut documents = fixtures::kyc();
        if !environment.is_test() {
            documents.extend(fixtures::production_kyc());
        }
        self.load(environment, CollectionKind::Kyc, documents).await
    }

    pub async fn load_domain(&self, environment: Environment, kind: CollectionKind) -> Result<usize> {
        match kind {
            CollectionKind::Minerals => self.load_catalog(environment).await,
            CollectionKind::Deals => self.load_deals(environment).await,
            CollectionKind::Kyc => self.load_kyc(environment).await,
        }
    }

    pub async fn load_all(&self, environment: Environment) -> Result<LoadReport> {
        self.load_all_with(environment, |_| {}).await
    }

    /// Loads minerals, deals and KYC in order, reporting each outcome to
    /// `on_domain` as it completes. A failed domain does not stop the others
    /// and nothing is rolled back. Only a store that cannot be opened is an
    /// error here.
    pub async fn load_all_with<F>(&self, environment: Environment, mut on_domain: F) -> Result<LoadReport>
    where
        F: FnMut(&DomainOutcome),
    {
        self.registry.open_store(environment).await?;
        tracing::info!("Loading all domains into the {} environment", environment);

        let mut domains = Vec::with_capacity(CollectionKind::ALL.len());
        for kind in CollectionKind::ALL {
            let outcome = match self.load_domain(environment, kind).await {
                Ok(loaded) => DomainOutcome {
                    collection: kind,
                    loaded,
                    error: None,
                },
                Err(e) => {
                    tracing::error!("Loading {} failed: {}", kind, e);
                    DomainOutcome {
                        collection: kind,
                        loaded: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            on_domain(&outcome);
            domains.push(outcome);
        }

        let report = LoadReport {
            environment,
            success: domains.iter().all(DomainOutcome::succeeded),
            domains,
        };

        if report.success {
            tracing::info!("Loaded {} documents into {}", report.total_loaded(), environment);
        } else {
            tracing::warn!("Partial load into {}, failed: {:?}", environment, report.failed());
        }
        Ok(report)
    }

    async fn load(&self, environment: Environment, kind: CollectionKind, documents: Vec<NewDocument>) -> Result<usize> {
        let store = self.registry.open_store(environment).await?;
        store.load_documents(kind, documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<(CollectionKind, Option<&str>)>) -> LoadReport {
        let domains: Vec<DomainOutcome> = outcomes
            .into_iter()
            .map(|(collection, error)| DomainOutcome {
                collection,
                loaded: if error.is_none() { 3 } else { 0 },
                error: error.map(str::to_string),
            })
            .collect();
        LoadReport {
            environment: Environment::Test,
            success: domains.iter().all(DomainOutcome::succeeded),
            domains,
        }
    }

    #[test]
    fn test_ensure_complete_names_failed_domains() {
        let partial = report(vec![
            (CollectionKind::Minerals, Some("catalog error: bad json")),
            (CollectionKind::Deals, None),
            (CollectionKind::Kyc, None),
        ]);
        assert_eq!(partial.total_loaded(), 6);
        match partial.ensure_complete() {
            Err(RagError::LoaderPartialFailure { failed }) => assert_eq!(failed, vec![CollectionKind::Minerals]),
            other => panic!("unexpected: {:?}", other),
        }

        let complete = report(vec![
            (CollectionKind::Minerals, None),
            (CollectionKind::Deals, None),
            (CollectionKind::Kyc, None),
        ]);
        assert!(complete.ensure_complete().is_ok());
    }
}
