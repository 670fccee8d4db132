//! HTTP surface. Every handler answers with the `{success, data | error}`
//! envelope and picks its environment from `?environment=` (production when
//! absent).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::RagError;
use crate::loader::BulkLoader;
use crate::models::{AddDocumentRequest, ApiResponse, CollectionKind, Environment, RagRequest, SearchRequest};
use crate::rag::RagEngine;

pub struct AppState {
    pub engine: Arc<RagEngine>,
    pub loader: Arc<BulkLoader>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvironmentQuery {
    #[serde(default)]
    environment: Option<String>,
}

impl EnvironmentQuery {
    fn resolve(&self) -> Result<Environment, RagError> {
        match self.environment.as_deref() {
            None | Some("") => Ok(Environment::default()),
            Some(raw) => raw.parse(),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/v1/stats", get(stats_handler))
        .route("/api/v1/search/:collection", post(search_handler))
        .route("/api/v1/rag/query", post(rag_query_handler))
        .route("/api/v1/documents/:collection", post(add_document_handler))
        .route("/api/v1/environments/test/cleanup", post(cleanup_handler))
        .route("/api/v1/environments/load", post(load_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn status_for(err: &RagError) -> StatusCode {
    match err {
        RagError::UnknownCollection(_) => StatusCode::NOT_FOUND,
        RagError::InvalidQuery(_) | RagError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        RagError::InvalidOperation(_) => StatusCode::FORBIDDEN,
        RagError::StoreInit { .. } | RagError::EmbeddingUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RagError::GenerationFailed { .. } => StatusCode::BAD_GATEWAY,
        RagError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        RagError::Index(_) | RagError::Catalog(_) | RagError::LoaderPartialFailure { .. } | RagError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: RagError, data: Option<JsonValue>) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed ({}): {}", err.kind(), err);
    } else {
        tracing::warn!("Request rejected ({}): {}", err.kind(), err);
    }

    let mut body = ApiResponse::<JsonValue>::failure(&err);
    body.data = data;
    (status, Json(body)).into_response()
}

fn respond<T: Serialize>(result: Result<T, RagError>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Err(RagError::GenerationFailed { message, retrieval }) => {
            // callers can fall back to the retrieved documents
            let data = serde_json::to_value(&*retrieval).ok();
            error_response(RagError::GenerationFailed { message, retrieval }, data)
        }
        Err(err) => error_response(err, None),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let generator_healthy = state.engine.generator().health_check().await.unwrap_or(false);

    respond(Ok(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "generator": generator_healthy,
            "embedder": state.engine.registry().settings().embedding.provider,
        }
    })))
}

async fn stats_handler(State(state): State<Arc<AppState>>, Query(query): Query<EnvironmentQuery>) -> Response {
    let result = async {
        let environment = query.resolve()?;
        let store = state.engine.registry().open_store(environment).await?;
        store.stats().await
    }
    .await;
    respond(result)
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(query): Query<EnvironmentQuery>,
    Json(request): Json<SearchRequest>,
) -> Response {
    let result = async {
        let kind: CollectionKind = collection.parse()?;
        let environment = query.resolve()?;
        let store = state.engine.registry().open_store(environment).await?;
        store.search(kind, &request, &CancellationToken::new()).await
    }
    .await;
    respond(result)
}

async fn rag_query_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EnvironmentQuery>,
    Json(request): Json<RagRequest>,
) -> Response {
    let request_id = Uuid::new_v4();
    tracing::info!("RAG query {}: {}", request_id, request.query);

    let result = async {
        let environment = query.resolve()?;
        let cancel = CancellationToken::new();
        // a dropped request future cancels any in-flight provider call
        let _guard = cancel.clone().drop_guard();
        state.engine.rag_query(&request, environment, &cancel).await
    }
    .await;

    if let Ok(ref answer) = result {
        tracing::info!(
            "RAG query {} answered by {} with {} sources",
            request_id,
            answer.model,
            answer.results_count
        );
    }
    respond(result)
}

async fn add_document_handler(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
    Query(query): Query<EnvironmentQuery>,
    Json(payload): Json<AddDocumentRequest>,
) -> Response {
    let result = async {
        let environment = query.resolve()?;
        let store = state.engine.registry().open_store(environment).await?;
        store
            .add_document(&collection, &payload.text, payload.attributes, payload.id)
            .await
    }
    .await;
    respond(result)
}

async fn cleanup_handler(State(state): State<Arc<AppState>>) -> Response {
    let result = state.engine.registry().purge(Environment::Test).await.map(|_| {
        serde_json::json!({
            "environment": Environment::Test,
            "purged": true,
        })
    });
    respond(result)
}

async fn load_handler(State(state): State<Arc<AppState>>, Query(query): Query<EnvironmentQuery>) -> Response {
    let environment = match query.resolve() {
        Ok(environment) => environment,
        Err(err) => return error_response(err, None),
    };

    match state.loader.load_all(environment).await {
        Ok(report) if report.success => respond(Ok(report)),
        Ok(report) => {
            let data = serde_json::to_value(&report).ok();
            error_response(RagError::LoaderPartialFailure { failed: report.failed() }, data)
        }
        Err(err) => error_response(err, None),
    }
}
