use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::RagError;

pub const ENVIRONMENT_KEY: &str = "environment";
pub const LOADED_AT_KEY: &str = "loaded_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 2] = [Environment::Test, Environment::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Environment::Test),
            "production" => Ok(Environment::Production),
            other => Err(RagError::InvalidQuery(format!("unknown environment: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Minerals,
    Deals,
    Kyc,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] =
        [CollectionKind::Minerals, CollectionKind::Deals, CollectionKind::Kyc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Minerals => "minerals",
            CollectionKind::Deals => "deals",
            CollectionKind::Kyc => "kyc",
        }
    }

    /// Tag used for generated document ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            CollectionKind::Minerals => "mineral",
            CollectionKind::Deals => "deal",
            CollectionKind::Kyc => "kyc",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CollectionKind::Minerals => "OpenMineralHub mineral catalog",
            CollectionKind::Deals => "OpenMineralHub trade deals",
            CollectionKind::Kyc => "KYC and compliance documents",
        }
    }

    pub fn compliance_standard(&self) -> Option<&'static str> {
        match self {
            CollectionKind::Kyc => Some("AML_KYC"),
            _ => None,
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minerals" => Ok(CollectionKind::Minerals),
            "deals" => Ok(CollectionKind::Deals),
            "kyc" => Ok(CollectionKind::Kyc),
            other => Err(RagError::UnknownCollection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_standard: Option<String>,
    pub environment: Environment,
}

impl CollectionMetadata {
    pub fn new(kind: CollectionKind, name: String, environment: Environment) -> Self {
        Self {
            name,
            description: kind.description().to_string(),
            version: "1.0".to_string(),
            project: "OpenMineralHub".to_string(),
            compliance_standard: kind.compliance_standard().map(str::to_string),
            environment,
        }
    }
}

/// Document attributes: two required keys plus an ordered extension map.
///
/// Extension values are restricted to scalars and lists of strings so every
/// backend can filter on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "JsonMap<String, JsonValue>", into = "JsonMap<String, JsonValue>")]
pub struct Attributes {
    pub environment: Environment,
    pub loaded_at: DateTime<Utc>,
    extra: JsonMap<String, JsonValue>,
}

impl Attributes {
    pub fn new(environment: Environment, loaded_at: DateTime<Utc>) -> Self {
        Self {
            environment,
            loaded_at,
            extra: JsonMap::new(),
        }
    }

    /// Builds attributes from a loose map, overriding whatever the map says
    /// about the required keys.
    pub fn from_map(
        mut map: JsonMap<String, JsonValue>,
        environment: Environment,
        loaded_at: DateTime<Utc>,
    ) -> Result<Self, RagError> {
        map.shift_remove(ENVIRONMENT_KEY);
        map.shift_remove(LOADED_AT_KEY);
        for (key, value) in &map {
            validate_value(key, value)?;
        }
        Ok(Self {
            environment,
            loaded_at,
            extra: map,
        })
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Result<(), RagError> {
        let key = key.into();
        let value = value.into();
        if key == ENVIRONMENT_KEY || key == LOADED_AT_KEY {
            return Err(RagError::InvalidDocument(format!("attribute '{}' is managed by the store", key)));
        }
        validate_value(&key, &value)?;
        self.extra.insert(key, value);
        Ok(())
    }

    /// Looks up any attribute, including the required keys.
    pub fn get(&self, key: &str) -> Option<JsonValue> {
        match key {
            ENVIRONMENT_KEY => Some(JsonValue::String(self.environment.as_str().to_string())),
            LOADED_AT_KEY => Some(JsonValue::String(self.loaded_at.to_rfc3339())),
            _ => self.extra.get(key).cloned(),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(JsonValue::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.extra.get(key).and_then(JsonValue::as_f64)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(JsonValue::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn extra(&self) -> &JsonMap<String, JsonValue> {
        &self.extra
    }

    pub fn to_map(&self) -> JsonMap<String, JsonValue> {
        let mut map = self.extra.clone();
        map.insert(LOADED_AT_KEY.to_string(), JsonValue::String(self.loaded_at.to_rfc3339()));
        map.insert(
            ENVIRONMENT_KEY.to_string(),
            JsonValue::String(self.environment.as_str().to_string()),
        );
        map
    }
}

impl From<Attributes> for JsonMap<String, JsonValue> {
    fn from(attributes: Attributes) -> Self {
        attributes.to_map()
    }
}

impl TryFrom<JsonMap<String, JsonValue>> for Attributes {
    type Error = RagError;

    fn try_from(map: JsonMap<String, JsonValue>) -> Result<Self, Self::Error> {
        let environment = map
            .get(ENVIRONMENT_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RagError::InvalidDocument("attributes missing 'environment'".to_string()))?
            .parse::<Environment>()
            .map_err(|e| RagError::InvalidDocument(e.to_string()))?;
        let loaded_at = map
            .get(LOADED_AT_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| RagError::InvalidDocument("attributes missing 'loaded_at'".to_string()))
            .and_then(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| RagError::InvalidDocument(format!("bad loaded_at: {}", e)))
            })?;
        Attributes::from_map(map, environment, loaded_at)
    }
}

fn validate_value(key: &str, value: &JsonValue) -> Result<(), RagError> {
    match value {
        JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_) => Ok(()),
        JsonValue::Array(items) if items.iter().all(JsonValue::is_string) => Ok(()),
        _ => Err(RagError::InvalidDocument(format!(
            "attribute '{}' must be a scalar or a list of strings",
            key
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    pub attributes: Attributes,
}

/// A document before the store has stamped it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub attributes: JsonMap<String, JsonValue>,
}

impl NewDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>, attributes: JsonValue) -> Self {
        let attributes = match attributes {
            JsonValue::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self {
            id: Some(id.into()),
            text: text.into(),
            attributes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_results", alias = "n_results")]
    pub k: usize,
    #[serde(default)]
    pub filter: Option<JsonMap<String, JsonValue>>,
}

fn default_results() -> usize {
    5
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: JsonValue) -> Self {
        if let JsonValue::Object(map) = filter {
            self.filter = Some(map);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_score(score: f64) -> Self {
        if score <= 2.0 {
            RiskTier::Low
        } else if score <= 3.0 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DerivedFields {
    Mineral {
        commodity_type: String,
        current_price: String,
    },
    Deal {
        deal_value_usd: String,
        status: String,
        risk: String,
        counterparty: String,
    },
    Kyc {
        company: String,
        jurisdiction: String,
        aml_status: String,
        risk_score: f64,
        risk_level: RiskTier,
        lei: String,
        verification_sources: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: Attributes,
    pub distance: f32,
    pub relevance_score: f32,
    #[serde(flatten)]
    pub derived: DerivedFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchSummary {
    Deals {
        total_deal_value_usd: f64,
    },
    Kyc {
        clean_entities: usize,
        average_risk_score: f64,
    },
    Minerals {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub collection: CollectionKind,
    pub environment: Environment,
    pub filters: Option<JsonMap<String, JsonValue>>,
    pub results_count: usize,
    pub results: Vec<SearchHit>,
    #[serde(flatten)]
    pub summary: SearchSummary,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagRequest {
    pub query: String,
    #[serde(default = "default_rag_results", alias = "n_results")]
    pub k: usize,
    #[serde(default)]
    pub filter: Option<JsonMap<String, JsonValue>>,
    #[serde(default)]
    pub collection: Option<CollectionKind>,
}

fn default_rag_results() -> usize {
    3
}

impl RagRequest {
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k,
            filter: None,
            collection: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub success: bool,
    pub query: String,
    pub rag_enabled: bool,
    pub results_count: usize,
    pub model: String,
    pub response: String,
    pub sources: Vec<Attributes>,
    pub prompt_tokens: usize,
    pub environment: Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocumentRequest {
    #[serde(alias = "document")]
    pub text: String,
    #[serde(default, alias = "metadata")]
    pub attributes: JsonMap<String, JsonValue>,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddDocumentResult {
    pub collection: CollectionKind,
    pub document_id: String,
    pub new_count: usize,
    pub test_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub minerals: usize,
    pub deals: usize,
    pub kyc: usize,
    pub total_vectors: usize,
    pub status: String,
    pub last_updated: DateTime<Utc>,
    pub environment: Environment,
    pub deals_value_usd: f64,
    pub confirmed_deals: usize,
    pub deals_avg_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub message: String,
}

/// Uniform `{success, data | error}` envelope for caller-facing operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &RagError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

// Chat completion wire types for the generation back end

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    #[serde(default)]
    pub finish_reason: Option<String>,
}
