pub mod embeddings;
pub mod filter;
pub mod generation;
pub mod memory_index;
pub mod retrieval;
pub mod stats;
pub mod store;
pub mod vector_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tiktoken_rs::CoreBPE;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationSettings;
use crate::error::{RagError, Result};
use crate::models::{CollectionKind, Environment, RagAnswer, RagRequest, SearchRequest};
use self::generation::Generator;
use self::store::StoreRegistry;

/// Model id reported when the generator is bypassed.
pub const MOCK_MODEL: &str = "mock";

pub(crate) enum Interrupted {
    TimedOut,
    Cancelled,
}

/// Runs `fut` under `limit`, giving up early if `cancel` fires.
pub(crate) async fn bounded<F, T>(limit: Duration, cancel: &CancellationToken, fut: F) -> Result<T, Interrupted>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        outcome = tokio::time::timeout(limit, fut) => outcome.map_err(|_| Interrupted::TimedOut),
    }
}

pub fn build_prompt(language: &str, context: &str, query: &str) -> String {
    format!(
        "Based on the following mineral commodity information, answer the user's query in {language}.\n\
         Answer only from the context below; if it does not contain the answer, say so.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         User Query: {query}\n\
         \n\
         Provide a concise, informative response focusing on key facts, prices, producers, and risks. \
         Include any relevant market insights."
    )
}

/// Retrieval-augmented answering over the environment stores.
pub struct RagEngine {
    registry: Arc<StoreRegistry>,
    generator: Arc<dyn Generator>,
    settings: GenerationSettings,
    tokenizer: Option<CoreBPE>,
}

impl RagEngine {
    pub fn new(registry: Arc<StoreRegistry>, generator: Arc<dyn Generator>, settings: GenerationSettings) -> Self {
        let tokenizer = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                tracing::warn!("Tokenizer unavailable, falling back to word counts: {}", e);
                None
            }
        };

        Self {
            registry,
            generator,
            settings,
            tokenizer,
        }
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        match self.tokenizer {
            Some(ref bpe) => bpe.encode_with_special_tokens(text).len(),
            None => text.split_whitespace().count(),
        }
    }

    pub async fn rag_query(
        &self,
        request: &RagRequest,
        environment: Environment,
        cancel: &CancellationToken,
    ) -> Result<RagAnswer> {
        let store = self.registry.open_store(environment).await?;
        let kind = request.collection.unwrap_or(CollectionKind::Minerals);

        let search_request = SearchRequest {
            query: request.query.clone(),
            k: request.k,
            filter: request.filter.clone(),
        };
        let retrieval = store.search(kind, &search_request, cancel).await?;

        let context = retrieval
            .results
            .iter()
            .map(|hit| hit.document.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = build_prompt(&self.settings.answer_language, &context, &request.query);

        let prompt_tokens = self.count_tokens(&prompt);
        if prompt_tokens > self.settings.max_prompt_tokens {
            tracing::warn!(
                "Prompt is {} tokens, above the budget of {}",
                prompt_tokens,
                self.settings.max_prompt_tokens
            );
        }

        let (model, response) = if environment.is_test() {
            (MOCK_MODEL.to_string(), self.settings.mock_response.clone())
        } else {
            let limit = Duration::from_millis(self.settings.timeout_ms);
            match bounded(limit, cancel, self.generator.generate(&prompt, self.settings.temperature)).await {
                Ok(Ok(text)) => (self.generator.model_id().to_string(), text),
                Ok(Err(e)) => {
                    tracing::error!("Generation failed: {}", e);
                    return Err(RagError::GenerationFailed {
                        message: e.to_string(),
                        retrieval: Box::new(retrieval),
                    });
                }
                Err(Interrupted::TimedOut) => {
                    tracing::error!("Generation timed out after {:?}", limit);
                    return Err(RagError::GenerationFailed {
                        message: format!("timed out after {} ms", limit.as_millis()),
                        retrieval: Box::new(retrieval),
                    });
                }
                Err(Interrupted::Cancelled) => return Err(RagError::Cancelled),
            }
        };

        tracing::info!(
            "RAG query answered from {} sources ({} environment, model {})",
            retrieval.results_count,
            environment,
            model
        );

        Ok(RagAnswer {
            success: true,
            query: request.query.clone(),
            rag_enabled: true,
            results_count: retrieval.results_count,
            model,
            response,
            sources: retrieval.results.iter().map(|hit| hit.metadata.clone()).collect(),
            prompt_tokens,
            environment,
        })
    }
}
