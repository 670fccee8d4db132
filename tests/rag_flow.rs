mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use mineral_rag::models::{CollectionKind, Environment, RagRequest};
use mineral_rag::rag::MOCK_MODEL;
use mineral_rag::RagError;

#[tokio::test]
async fn test_test_environment_never_calls_generator() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());
    common::loader(&registry).load_all(Environment::Test).await.unwrap();
    let generator = common::CountingGenerator::answering("should not be used");
    let engine = common::engine(&registry, generator.clone());

    let answer = engine
        .rag_query(&RagRequest::new("copper prices on the LME", 3), Environment::Test, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 0);
    assert_eq!(answer.model, MOCK_MODEL);
    assert_eq!(answer.response, registry.settings().generation.mock_response);
    assert!(answer.success);
    assert!(answer.rag_enabled);
    assert_eq!(answer.results_count, 3);
    assert_eq!(answer.sources.len(), 3);
    assert!(answer.prompt_tokens > 0);
    assert_eq!(answer.environment, Environment::Test);
}

#[tokio::test]
async fn test_production_answers_from_generator() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());
    common::loader(&registry).load_all(Environment::Production).await.unwrap();
    let generator = common::CountingGenerator::answering("Copper trades near $9,500/ton.");
    let engine = common::engine(&registry, generator.clone());

    let answer = engine
        .rag_query(&RagRequest::new("copper price", 2), Environment::Production, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert_eq!(answer.model, "stub-model");
    assert_eq!(answer.response, "Copper trades near $9,500/ton.");
    assert_eq!(answer.results_count, 2);
    assert!(answer
        .sources
        .iter()
        .all(|source| source.environment == Environment::Production));
}

#[tokio::test]
async fn test_rag_over_other_collection() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());
    common::loader(&registry).load_all(Environment::Test).await.unwrap();
    let engine = common::engine(&registry, common::CountingGenerator::answering("unused"));

    let mut request = RagRequest::new("counterparty AML screening", 10);
    request.collection = Some(CollectionKind::Kyc);
    let answer = engine
        .rag_query(&request, Environment::Test, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(answer.results_count, 4);
}

#[tokio::test]
async fn test_generation_failure_keeps_retrieval() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());
    common::loader(&registry).load_all(Environment::Production).await.unwrap();
    let generator = common::CountingGenerator::failing("upstream returned 500");
    let engine = common::engine(&registry, generator.clone());

    let err = engine
        .rag_query(&RagRequest::new("gold safe haven", 3), Environment::Production, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(generator.calls(), 1);
    match err {
        RagError::GenerationFailed { message, retrieval } => {
            assert!(message.contains("upstream returned 500"));
            assert_eq!(retrieval.results_count, 3);
            assert_eq!(retrieval.collection, CollectionKind::Minerals);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_generator_times_out_as_generation_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = common::settings(dir.path());
    settings.generation.timeout_ms = 50;
    let embedder = mineral_rag::rag::embeddings::build_embedder(&settings.embedding).unwrap();
    let registry = common::registry_with(settings, embedder);
    common::loader(&registry).load_all(Environment::Production).await.unwrap();
    let engine = common::engine(&registry, common::CountingGenerator::slow(Duration::from_secs(5)));

    let err = engine
        .rag_query(&RagRequest::new("nickel", 1), Environment::Production, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        RagError::GenerationFailed { message, retrieval } => {
            assert!(message.contains("timed out"));
            assert_eq!(retrieval.results_count, 1);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_generation() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());
    common::loader(&registry).load_all(Environment::Production).await.unwrap();
    let engine = common::engine(&registry, common::CountingGenerator::slow(Duration::from_secs(30)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = engine
        .rag_query(&RagRequest::new("iron ore", 2), Environment::Production, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Cancelled));
}

#[tokio::test]
async fn test_production_load_falls_back_to_built_in_minerals() {
    let dir = tempfile::tempdir().unwrap();
    let registry = common::registry(dir.path());

    let report = common::loader(&registry).load_all(Environment::Production).await.unwrap();

    assert!(report.success);
    let counts: Vec<(CollectionKind, usize)> = report.domains.iter().map(|d| (d.collection, d.loaded)).collect();
    assert_eq!(
        counts,
        vec![
            (CollectionKind::Minerals, 5),
            (CollectionKind::Deals, 7),
            (CollectionKind::Kyc, 6)
        ]
    );
    assert_eq!(report.total_loaded(), 18);
}

#[tokio::test]
async fn test_production_load_reads_catalog_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::settings(dir.path());
    std::fs::write(
        &settings.loader.catalog_path,
        r#"{ "minerals": [ {
            "symbol": "Sn",
            "name": { "en": "Tin", "ru": "Олово" },
            "description": "Solder metal",
            "type": "base_metal",
            "current_price": 25000,
            "unit": "USD/ton",
            "market": "LME",
            "annual_production": 300000
        } ] }"#,
    )
    .unwrap();
    let registry = common::registry(dir.path());

    let loaded = common::loader(&registry)
        .load_catalog(Environment::Production)
        .await
        .unwrap();
    assert_eq!(loaded, 1);

    let store = registry.open_store(Environment::Production).await.unwrap();
    let docs = store.get_all(CollectionKind::Minerals).await.unwrap();
    assert_eq!(docs[0].id, "mineral_sn");
    assert_eq!(docs[0].attributes.get_str("name_en"), Some("Tin"));
}

#[tokio::test]
async fn test_malformed_catalog_fails_only_its_domain() {
    let dir = tempfile::tempdir().unwrap();
    let settings = common::settings(dir.path());
    std::fs::write(&settings.loader.catalog_path, "{ broken").unwrap();
    let registry = common::registry(dir.path());

    let report = common::loader(&registry).load_all(Environment::Production).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.failed(), vec![CollectionKind::Minerals]);
    assert_eq!(report.total_loaded(), 13);
    assert!(matches!(
        report.ensure_complete(),
        Err(RagError::LoaderPartialFailure { .. })
    ));
}
