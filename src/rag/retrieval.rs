//! Filtered kNN search with per-domain enrichment.

use std::time::Instant;

use serde_json::{Map as JsonMap, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::error::{RagError, Result};
use crate::models::{
    Attributes, CollectionKind, DerivedFields, RiskTier, SearchHit, SearchRequest, SearchResponse, SearchSummary,
};
use crate::rag::filter::Filter;
use crate::rag::store::CollectionStore;
use crate::rag::vector_store::IndexHit;

impl CollectionStore {
    /// Returns up to `k` documents of `kind` nearest to the query, restricted
    /// to this store's environment and the caller's filter.
    pub async fn search(
        &self,
        kind: CollectionKind,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let started = Instant::now();

        if request.k == 0 {
            return Err(RagError::InvalidQuery("k must be at least 1".to_string()));
        }
        if request.query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be empty".to_string()));
        }

        let filter = match request.filter {
            Some(ref map) => Filter::from_where(map)?,
            None => Filter::new(),
        }
        .scoped_to(self.environment());

        let vector = self
            .embed(std::slice::from_ref(&request.query), cancel)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingUnavailable("no vector returned for query".to_string()))?;

        if cancel.is_cancelled() {
            return Err(RagError::Cancelled);
        }

        let mut hits = self
            .index()
            .query(self.collection_name(kind), &vector, request.k, &filter)
            .await?;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(request.k);

        let results: Vec<SearchHit> = hits.into_iter().map(|hit| enrich(kind, hit)).collect();
        let summary = summarize(kind, &results);
        let processing_time_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Search in {} ({}) returned {} results in {} ms",
            kind,
            self.environment(),
            results.len(),
            processing_time_ms
        );

        Ok(SearchResponse {
            query: request.query.clone(),
            collection: kind,
            environment: self.environment(),
            filters: request.filter.clone(),
            results_count: results.len(),
            results,
            summary,
            processing_time_ms,
        })
    }

    pub async fn search_minerals(
        &self,
        query: &str,
        k: usize,
        filter: Option<JsonMap<String, JsonValue>>,
    ) -> Result<SearchResponse> {
        let request = SearchRequest {
            query: query.to_string(),
            k,
            filter,
        };
        self.search(CollectionKind::Minerals, &request, &CancellationToken::new())
            .await
    }

    pub async fn search_deals(
        &self,
        query: &str,
        k: usize,
        status: Option<&str>,
        risk: Option<&str>,
    ) -> Result<SearchResponse> {
        let mut filter = JsonMap::new();
        if let Some(status) = status {
            filter.insert("status".to_string(), JsonValue::from(status));
        }
        if let Some(risk) = risk {
            filter.insert("risk_level".to_string(), JsonValue::from(risk));
        }
        let request = SearchRequest {
            query: query.to_string(),
            k,
            filter: (!filter.is_empty()).then_some(filter),
        };
        self.search(CollectionKind::Deals, &request, &CancellationToken::new())
            .await
    }

    /// KYC search screened on AML status, `clean` unless told otherwise.
    pub async fn search_kyc(&self, query: &str, k: usize, aml_status: Option<&str>) -> Result<SearchResponse> {
        let mut filter = JsonMap::new();
        filter.insert(
            "aml_status".to_string(),
            JsonValue::from(aml_status.unwrap_or("clean")),
        );
        let request = SearchRequest {
            query: query.to_string(),
            k,
            filter: Some(filter),
        };
        self.search(CollectionKind::Kyc, &request, &CancellationToken::new())
            .await
    }
}

fn enrich(kind: CollectionKind, hit: IndexHit) -> SearchHit {
    let attrs = &hit.document.attributes;
    let text_or = |key: &str, default: &str| attrs.get_str(key).unwrap_or(default).to_string();

    let derived = match kind {
        CollectionKind::Minerals => DerivedFields::Mineral {
            commodity_type: text_or("type", "unknown"),
            current_price: format!(
                "{}/{}",
                format_usd(attrs.get_f64("current_price").unwrap_or(0.0)),
                attrs.get_str("unit").unwrap_or("N/A")
            ),
        },
        CollectionKind::Deals => DerivedFields::Deal {
            deal_value_usd: format_usd(deal_amount(attrs)),
            status: text_or("status", "unknown"),
            risk: text_or("risk_level", "unknown"),
            counterparty: text_or("counterparty", "N/A"),
        },
        CollectionKind::Kyc => {
            let risk_score = attrs.get_f64("risk_score").unwrap_or(0.0);
            DerivedFields::Kyc {
                company: text_or("company_name", "N/A"),
                jurisdiction: text_or("jurisdiction", "N/A"),
                aml_status: text_or("aml_status", "unknown"),
                risk_score,
                risk_level: RiskTier::from_score(risk_score),
                lei: text_or("lei", "N/A"),
                verification_sources: attrs.get_string_list("verification_sources"),
            }
        }
    };

    SearchHit {
        id: hit.document.id,
        document: hit.document.text,
        metadata: hit.document.attributes,
        distance: hit.distance,
        relevance_score: relevance(hit.distance),
        derived,
    }
}

fn summarize(kind: CollectionKind, results: &[SearchHit]) -> SearchSummary {
    match kind {
        CollectionKind::Minerals => SearchSummary::Minerals {},
        CollectionKind::Deals => SearchSummary::Deals {
            total_deal_value_usd: results.iter().map(|hit| deal_amount(&hit.metadata)).sum(),
        },
        CollectionKind::Kyc => {
            let clean_entities = results
                .iter()
                .filter(|hit| hit.metadata.get_str("aml_status") == Some("clean"))
                .count();
            let average_risk_score = if results.is_empty() {
                0.0
            } else {
                let total: f64 = results
                    .iter()
                    .map(|hit| hit.metadata.get_f64("risk_score").unwrap_or(0.0))
                    .sum();
                (total / results.len() as f64 * 10.0).round() / 10.0
            };
            SearchSummary::Kyc {
                clean_entities,
                average_risk_score,
            }
        }
    }
}

/// `1 - distance`, clamped to `[0, 1]`.
pub fn relevance(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Contract value of a deal; older records carry `total_amount`.
pub(crate) fn deal_amount(attrs: &Attributes) -> f64 {
    attrs
        .get_f64("total_amount_usd")
        .or_else(|| attrs.get_f64("total_amount"))
        .unwrap_or(0.0)
}

/// Dollar amount with thousands separators and no decimals: `$4,750,000`.
pub fn format_usd(value: f64) -> String {
    format!("${}", group_digits(value))
}

/// Rounds to a whole number and inserts thousands separators.
pub fn group_digits(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0.0 && digits != "0" {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
