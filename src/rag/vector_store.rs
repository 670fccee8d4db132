use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter as QdrantFilter,
    GetPointsBuilder, PointId, PointStruct, Range, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::{Map as JsonMap, Value as JsonValue};
use uuid::Uuid;

use crate::config::StoreSettings;
use crate::error::{RagError, Result};
use crate::models::{CollectionMetadata, Document, Environment};
use crate::rag::filter::{Filter, FilterCondition, FilterOperator};

const RECORD_KEY: &str = "_record";
const SEQUENCE_KEY: &str = "_seq";

/// A document together with its embedding, ready to be written.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct IndexHit {
    pub document: Document,
    pub distance: f32,
}

/// Contract every vector backend fulfils: named collections, upsert by id
/// (an overwritten document keeps its insertion position), exact counts, full
/// dumps in insertion order, and filtered kNN returning hits by ascending
/// distance with ties in insertion order.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Creates the collection if it does not exist; existing collections are
    /// left untouched.
    async fn ensure_collection(&self, metadata: &CollectionMetadata, dimensions: usize) -> Result<()>;

    async fn upsert(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()>;

    async fn count(&self, collection: &str) -> Result<usize>;

    async fn get_all(&self, collection: &str) -> Result<Vec<Document>>;

    async fn query(&self, collection: &str, vector: &[f32], k: usize, filter: &Filter) -> Result<Vec<IndexHit>>;

    /// Removes every document. The collection itself stays queryable
    /// throughout.
    async fn clear(&self, collection: &str) -> Result<()>;

    /// Rebuilds whatever local storage the backend owns from the live
    /// collections.
    async fn reset_storage(&self) -> Result<()>;
}

pub struct QdrantIndex {
    client: Qdrant,
}

impl QdrantIndex {
    pub async fn connect(settings: &StoreSettings, environment: Environment) -> Result<Self> {
        tracing::info!("Building Qdrant client for URL: {}", settings.qdrant_url);
        let client = Qdrant::from_url(&settings.qdrant_url)
            .api_key(settings.qdrant_api_key.clone())
            .build()
            .map_err(|e| RagError::StoreInit {
                environment,
                message: format!("Qdrant client build failed: {}", e),
            })?;

        if let Err(e) = client.health_check().await {
            tracing::error!("Qdrant health check failed: {:?}", e);
            return Err(RagError::StoreInit {
                environment,
                message: format!("Qdrant unreachable at {}: {}", settings.qdrant_url, e),
            });
        }

        tracing::info!("Qdrant client built successfully");
        Ok(Self { client })
    }

    fn point_id(doc_id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn backend_name(&self) -> &'static str {
        "qdrant"
    }

    async fn ensure_collection(&self, metadata: &CollectionMetadata, dimensions: usize) -> Result<()> {
        if !self.client.collection_exists(&metadata.name).await? {
            tracing::info!("Creating Qdrant collection {}", metadata.name);
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&metadata.name)
                        .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
                )
                .await?;
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: Vec<IndexedDocument>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<String> = documents.iter().map(|d| Self::point_id(&d.document.id)).collect();
        let known = self.existing_sequences(collection, &point_ids).await?;

        let base_seq = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let mut points = Vec::with_capacity(documents.len());
        for (offset, (indexed, point_id)) in documents.into_iter().zip(point_ids).enumerate() {
            let record = serde_json::to_string(&indexed.document)
                .map_err(|e| RagError::Index(format!("encode record: {}", e)))?;
            let seq = known.get(&point_id).copied().unwrap_or(base_seq + offset as i64);

            let mut payload_map: JsonMap<String, JsonValue> = indexed.document.attributes.to_map();
            payload_map.insert(RECORD_KEY.to_string(), JsonValue::String(record));
            payload_map.insert(SEQUENCE_KEY.to_string(), JsonValue::from(seq));

            points.push(PointStruct::new(point_id, indexed.vector, payload_map));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    async fn get_all(&self, collection: &str) -> Result<Vec<Document>> {
        let mut records: Vec<(i64, Document)> = Vec::new();
        let mut offset: Option<qdrant_client::qdrant::PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(collection).limit(100).with_payload(true);
            if let Some(ref off) = offset {
                builder = builder.offset(off.clone());
            }

            let result = self.client.scroll(builder).await?;
            for point in &result.result {
                let seq = payload_i64(&point.payload, SEQUENCE_KEY).unwrap_or_default();
                records.push((seq, decode_record(&point.payload)?));
            }

            offset = result.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        records.sort_by_key(|(seq, _)| *seq);
        Ok(records.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn query(&self, collection: &str, vector: &[f32], k: usize, filter: &Filter) -> Result<Vec<IndexHit>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector.to_vec(), k as u64)
                    .filter(to_qdrant_filter(filter))
                    .with_payload(true),
            )
            .await?;

        let scored = search_result
            .result
            .into_iter()
            .map(|point| scored_hit(&point.payload, point.score))
            .collect::<Result<Vec<_>>>()?;
        Ok(order_hits(scored))
    }

    async fn clear(&self, collection: &str) -> Result<()> {
        // an empty filter selects every point
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(QdrantFilter::default()).wait(true))
            .await?;
        tracing::info!("Qdrant collection {} cleared", collection);
        Ok(())
    }

    async fn reset_storage(&self) -> Result<()> {
        Ok(())
    }
}

impl QdrantIndex {
    /// `_seq` of the given points that already exist, keyed by point id.
    async fn existing_sequences(&self, collection: &str, point_ids: &[String]) -> Result<HashMap<String, i64>> {
        let ids: Vec<PointId> = point_ids.iter().cloned().map(PointId::from).collect();
        let response = self
            .client
            .get_points(GetPointsBuilder::new(collection, ids).with_payload(true))
            .await?;

        Ok(response
            .result
            .iter()
            .filter_map(|point| {
                let id = point_id_string(point.id.as_ref()?)?;
                Some((id, payload_i64(&point.payload, SEQUENCE_KEY)?))
            })
            .collect())
    }
}

fn point_id_string(id: &PointId) -> Option<String> {
    match id.point_id_options.as_ref()? {
        PointIdOptions::Uuid(uuid) => Some(uuid.clone()),
        PointIdOptions::Num(num) => Some(num.to_string()),
    }
}

/// Decodes a search hit, keeping its `_seq` for tie-breaking.
fn scored_hit(payload: &HashMap<String, Value>, score: f32) -> Result<(i64, IndexHit)> {
    let seq = payload_i64(payload, SEQUENCE_KEY).unwrap_or_default();
    Ok((
        seq,
        IndexHit {
            document: decode_record(payload)?,
            // cosine similarity -> cosine distance
            distance: 1.0 - score,
        },
    ))
}

/// Ascending distance, equal distances in insertion order.
fn order_hits(mut scored: Vec<(i64, IndexHit)>) -> Vec<IndexHit> {
    scored.sort_by(|(seq_a, a), (seq_b, b)| a.distance.total_cmp(&b.distance).then(seq_a.cmp(seq_b)));
    scored.into_iter().map(|(_, hit)| hit).collect()
}

fn decode_record(payload: &HashMap<String, Value>) -> Result<Document> {
    let raw = match payload.get(RECORD_KEY).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(text)) => text,
        _ => return Err(RagError::Index("point payload is missing its record".to_string())),
    };
    serde_json::from_str(raw).map_err(|e| RagError::Index(format!("decode record: {}", e)))
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(value) => Some(*value),
        Kind::DoubleValue(value) => Some(*value as i64),
        _ => None,
    }
}

pub(crate) fn to_qdrant_filter(filter: &Filter) -> QdrantFilter {
    let mut must = Vec::new();
    let mut must_not = Vec::new();

    for cond in &filter.must {
        match cond.op {
            FilterOperator::Eq => must.push(match_condition(&cond.field, &cond.value)),
            FilterOperator::Ne => {
                must_not.push(match_condition(&cond.field, &cond.value));
                must_not.push(Condition::is_empty(cond.field.clone()));
            }
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
                must.push(range_condition(cond));
            }
            FilterOperator::In => {
                let options: Vec<Condition> = cond
                    .value
                    .as_array()
                    .map(|items| items.iter().map(|v| match_condition(&cond.field, v)).collect())
                    .unwrap_or_default();
                must.push(Condition::from(QdrantFilter::should(options)));
            }
        }
    }

    QdrantFilter {
        must,
        must_not,
        ..Default::default()
    }
}

fn match_condition(field: &str, value: &JsonValue) -> Condition {
    match value {
        JsonValue::String(s) => Condition::matches(field, s.clone()),
        JsonValue::Bool(b) => Condition::matches(field, *b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Condition::matches(field, i),
            None => {
                let f = n.as_f64().unwrap_or_default();
                Condition::range(
                    field,
                    Range {
                        gte: Some(f),
                        lte: Some(f),
                        ..Default::default()
                    },
                )
            }
        },
        // operands are validated when the filter is parsed
        _ => Condition::is_empty(field),
    }
}

fn range_condition(cond: &FilterCondition) -> Condition {
    let bound = cond.value.as_f64();
    let mut range = Range::default();
    match cond.op {
        FilterOperator::Gt => range.gt = bound,
        FilterOperator::Gte => range.gte = bound,
        FilterOperator::Lt => range.lt = bound,
        FilterOperator::Lte => range.lte = bound,
        _ => {}
    }
    Condition::range(cond.field.clone(), range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_ids_are_stable_uuids() {
        let a = QdrantIndex::point_id("cu_base_metal");
        assert_eq!(a, QdrantIndex::point_id("cu_base_metal"));
        assert_ne!(a, QdrantIndex::point_id("li_battery_material"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    fn payload(id: &str, seq: i64) -> HashMap<String, Value> {
        let mut attributes = crate::models::Attributes::new(Environment::Production, Utc::now());
        attributes.insert("status", "open").unwrap();
        let record = serde_json::to_string(&Document {
            id: id.to_string(),
            text: format!("deal {}", id),
            attributes,
        })
        .unwrap();
        HashMap::from([
            (RECORD_KEY.to_string(), Value::from(record)),
            (SEQUENCE_KEY.to_string(), Value::from(seq)),
        ])
    }

    #[test]
    fn test_equal_scores_come_back_in_insertion_order() {
        let scored = vec![
            scored_hit(&payload("late", 30), 0.9).unwrap(),
            scored_hit(&payload("best", 50), 0.95).unwrap(),
            scored_hit(&payload("early", 10), 0.9).unwrap(),
            scored_hit(&payload("middle", 20), 0.9).unwrap(),
        ];

        let ids: Vec<String> = order_hits(scored).into_iter().map(|hit| hit.document.id).collect();
        assert_eq!(ids, vec!["best", "early", "middle", "late"]);
    }

    #[test]
    fn test_hit_without_record_is_an_error() {
        let payload = HashMap::from([(SEQUENCE_KEY.to_string(), Value::from(1i64))]);
        assert!(matches!(scored_hit(&payload, 0.5), Err(RagError::Index(_))));
    }

    #[test]
    fn test_filter_translation_shapes() {
        let filter = Filter::from_where(
            json!({
                "status": "confirmed",
                "risk_score": { "$lte": 3 },
                "aml_status": { "$ne": "enhanced_monitoring" },
                "commodity": ["copper", "gold"]
            })
            .as_object()
            .unwrap(),
        )
        .unwrap()
        .scoped_to(Environment::Test);

        let translated = to_qdrant_filter(&filter);
        // status, range, membership, environment
        assert_eq!(translated.must.len(), 4);
        // the excluded value plus the missing-field guard
        assert_eq!(translated.must_not.len(), 2);
    }
}
