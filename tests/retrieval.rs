mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use mineral_rag::models::{CollectionKind, DerivedFields, Environment, SearchRequest, SearchSummary};
use mineral_rag::{CollectionStore, RagError};

async fn loaded_test_store(dir: &std::path::Path) -> Arc<CollectionStore> {
    let registry = common::registry(dir);
    let report = common::loader(&registry).load_all(Environment::Test).await.unwrap();
    assert!(report.success);
    registry.open_store(Environment::Test).await.unwrap()
}

#[tokio::test]
async fn test_results_are_ordered_by_distance() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let response = store.search_minerals("lithium battery", 2, None).await.unwrap();

    assert_eq!(response.results_count, 2);
    assert_eq!(response.results.len(), 2);
    assert!(response.results[0].distance <= response.results[1].distance);
    assert_eq!(response.results[0].id, "li_battery_material");
    for hit in &response.results {
        assert!((0.0..=1.0).contains(&hit.relevance_score));
        assert!(matches!(hit.derived, DerivedFields::Mineral { .. }));
    }
    assert_eq!(response.summary, SearchSummary::Minerals {});
}

#[tokio::test]
async fn test_k_larger_than_collection_returns_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let response = store.search_minerals("metal", 50, None).await.unwrap();
    assert_eq!(response.results_count, 5);
    assert!(response
        .results
        .windows(2)
        .all(|pair| pair[0].distance <= pair[1].distance));
}

#[tokio::test]
async fn test_kyc_search_screens_on_aml_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let response = store.search_kyc("commodity trading company", 10, None).await.unwrap();
    assert_eq!(response.results_count, 3);
    match response.summary {
        SearchSummary::Kyc { clean_entities, average_risk_score } => {
            assert_eq!(clean_entities, response.results_count);
            assert!(average_risk_score > 0.0);
        }
        ref other => panic!("unexpected summary: {:?}", other),
    }
    for hit in &response.results {
        match hit.derived {
            DerivedFields::Kyc { ref aml_status, .. } => assert_eq!(aml_status, "clean"),
            ref other => panic!("unexpected fields: {:?}", other),
        }
    }

    let monitored = store
        .search_kyc("commodity trading company", 10, Some("enhanced_monitoring"))
        .await
        .unwrap();
    assert_eq!(monitored.results_count, 1);
}

#[tokio::test]
async fn test_deal_filters_are_conjunctive() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let confirmed = store.search_deals("copper cathode", 10, Some("confirmed"), None).await.unwrap();
    assert_eq!(confirmed.results_count, 1);
    assert_eq!(confirmed.results[0].metadata.get_str("status"), Some("confirmed"));

    let none = store
        .search_deals("copper cathode", 10, Some("confirmed"), Some("low"))
        .await
        .unwrap();
    assert_eq!(none.results_count, 0);
    assert_eq!(none.summary, SearchSummary::Deals { total_deal_value_usd: 0.0 });

    let everything = store.search_deals("copper cathode", 10, None, None).await.unwrap();
    assert_eq!(everything.results_count, 5);
    match everything.summary {
        SearchSummary::Deals { total_deal_value_usd } => assert!(total_deal_value_usd > 0.0),
        ref other => panic!("unexpected summary: {:?}", other),
    }
}

#[tokio::test]
async fn test_operator_filters() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let request = SearchRequest::new("deal", 10).with_filter(json!({ "status": { "$in": ["open", "executed"] } }));
    let response = store
        .search(CollectionKind::Deals, &request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(response.results_count, 2);
    assert_eq!(
        response.filters,
        Some(json!({ "status": { "$in": ["open", "executed"] } }).as_object().unwrap().clone())
    );

    let bad = SearchRequest::new("deal", 10).with_filter(json!({ "status": { "$regex": "o.*" } }));
    let err = store
        .search(CollectionKind::Deals, &bad, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;
    let cancel = CancellationToken::new();

    let zero = SearchRequest::new("copper", 0);
    assert!(matches!(
        store.search(CollectionKind::Minerals, &zero, &cancel).await,
        Err(RagError::InvalidQuery(_))
    ));

    let blank = SearchRequest::new("  ", 3);
    assert!(matches!(
        store.search(CollectionKind::Minerals, &blank, &cancel).await,
        Err(RagError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_cancelled_search_reports_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let store = loaded_test_store(dir.path()).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = store
        .search(CollectionKind::Minerals, &SearchRequest::new("copper", 3), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled));
}

#[tokio::test]
async fn test_embedding_failures_surface_as_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(common::BrokenEmbedder {
        dimensions: 16,
        delay: Duration::ZERO,
    });
    let registry = common::registry_with(common::settings(dir.path()), embedder);
    let store = registry.open_store(Environment::Test).await.unwrap();

    let err = store.search_minerals("copper", 3, None).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable(_)));

    let err = store
        .add_document("minerals", "Tin (Sn)", Default::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable(_)));
    assert_eq!(store.count(CollectionKind::Minerals).await.unwrap(), 0);
}

#[tokio::test]
async fn test_slow_embedder_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::settings(dir.path());
    settings.embedding.timeout_ms = 50;
    let embedder = Arc::new(common::BrokenEmbedder {
        dimensions: 16,
        delay: Duration::from_secs(5),
    });
    let registry = common::registry_with(settings, embedder);
    let store = registry.open_store(Environment::Test).await.unwrap();

    let err = store.search_minerals("copper", 3, None).await.unwrap_err();
    match err {
        RagError::EmbeddingUnavailable(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {:?}", other),
    }
}
