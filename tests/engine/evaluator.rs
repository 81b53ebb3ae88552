use charter::core::config::{CharterConfig, FallbackPolicy};
use charter::core::db;
use charter::core::error::CharterError;
use charter::core::store::Store;
use charter::engine::embedding::{EmbeddingProvider, HashBucketProvider, embed_with_timeout};
use charter::engine::evaluator::{Verdict, evaluate, evaluate_batch};
use charter::engine::log;
use charter::engine::polarity::{LexiconPolarity, NeutralPolarity, classifier_from_config};
use charter::engine::principles::{create_principle, set_embedding};
use charter::engine::tenants::{create_tenant, link_principle};
use std::sync::Arc;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path());
    db::initialize_db(&store.root).unwrap();
    (tmp, store)
}

fn hash_provider(cfg: &CharterConfig) -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashBucketProvider::new(cfg.embedding.dimensions))
}

struct FailingProvider;
impl EmbeddingProvider for FailingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, CharterError> {
        Err(CharterError::ProviderUnavailable("network down".into()))
    }
    fn dimensions(&self) -> usize {
        384
    }
    fn name(&self) -> &str {
        "failing"
    }
}

/// Create a principle and embed it with the given provider.
fn seeded_principle(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
    body: &str,
    category: &str,
) -> String {
    let p = create_principle(store, body, category).unwrap();
    let v = embed_with_timeout(provider, body, cfg.provider_timeout()).unwrap();
    set_embedding(store, cfg, &p.id, &v).unwrap();
    p.id
}

#[test]
fn plain_text_passwords_violate_the_encryption_principle() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);
    let classifier = classifier_from_config(&cfg);

    let principle_id = seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );
    let tenant = create_tenant(&store, "Default", "default").unwrap();
    link_principle(&store, &tenant.id, &principle_id).unwrap();

    let result = evaluate(
        &store,
        &cfg,
        &provider,
        classifier.as_ref(),
        Some(&tenant.id),
        "store user passwords in plain text",
        None,
    )
    .unwrap();

    assert_eq!(result.verdict, Verdict::Scored);
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.matched[0].principle_id, principle_id);
    assert!(result.matched[0].similarity >= cfg.matching.threshold);
    // Single match: aggregate equals that match's similarity.
    assert!((result.score.unwrap() - result.matched[0].similarity).abs() < 1e-12);
    // "must be" is in the default violation lexicon.
    assert_eq!(result.violations.len(), 1);

    // The evaluation was logged.
    let rows = log::query_by_tenant(&store, Some(&tenant.id), None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].action, "store user passwords in plain text");
    assert_eq!(rows[0].score, result.score);
}

#[test]
fn unrelated_action_matches_nothing() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    let principle_id = seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );
    let tenant = create_tenant(&store, "Default", "default").unwrap();
    link_principle(&store, &tenant.id, &principle_id).unwrap();

    let result = evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        Some(&tenant.id),
        "paint the office wall",
        None,
    )
    .unwrap();

    assert_eq!(result.verdict, Verdict::Scored);
    assert!(result.matched.is_empty());
    assert_eq!(result.score, Some(0.0));
    assert!(result.violations.is_empty());
}

#[test]
fn empty_action_is_rejected_before_embedding() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    // A failing provider proves validation happens first.
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingProvider);
    let err = evaluate(&store, &cfg, &provider, &NeutralPolarity, None, "  \n", None).unwrap_err();
    assert!(matches!(err, CharterError::Validation(_)));
}

#[test]
fn provider_failure_without_fallback_logs_nothing() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    assert_eq!(cfg.embedding.on_provider_failure, FallbackPolicy::Fail);
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingProvider);

    let err = evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        None,
        "store user passwords in plain text",
        None,
    )
    .unwrap_err();
    assert!(matches!(err, CharterError::ProviderUnavailable(_)));
    assert_eq!(log::count(&store).unwrap(), 0);
}

#[test]
fn provider_failure_with_fallback_yields_unknown_verdict() {
    let (_tmp, store) = test_store();
    let mut cfg = CharterConfig::default();
    cfg.embedding.on_provider_failure = FallbackPolicy::Unknown;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(FailingProvider);

    let result = evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        None,
        "store user passwords in plain text",
        None,
    )
    .unwrap();

    // No fabricated score: verdict unknown, score null, still logged.
    assert_eq!(result.verdict, Verdict::Unknown);
    assert_eq!(result.score, None);
    assert!(result.matched.is_empty());

    let rows = log::query_by_tenant(&store, None, None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, None);
    assert_eq!(rows[0].result["verdict"], "unknown");
}

#[test]
fn untenanted_evaluation_scopes_to_the_global_set() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );

    let result = evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        None,
        "store user passwords in plain text",
        None,
    )
    .unwrap();
    assert_eq!(result.matched.len(), 1);
    assert_eq!(result.tenant_id, None);

    let rows = log::query_by_tenant(&store, None, None, None).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].tenant_id, None);
}

#[test]
fn tenant_with_no_links_scores_zero_and_gets_recommendations() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    let principle_id = seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );
    let tenant = create_tenant(&store, "Fresh", "fresh").unwrap();

    let result = evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        Some(&tenant.id),
        "store user passwords in plain text",
        None,
    )
    .unwrap();

    // Never over-scopes to the global set...
    assert!(result.matched.is_empty());
    assert_eq!(result.score, Some(0.0));
    // ...but does suggest the relevant unlinked principle.
    assert_eq!(result.recommendations.len(), 1);
    assert!(result.recommendations[0].contains(&principle_id));
}

#[test]
fn custom_polarity_strategy_drives_violations() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    let principle_id = seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );
    let tenant = create_tenant(&store, "Default", "default").unwrap();
    link_principle(&store, &tenant.id, &principle_id).unwrap();

    // A lexicon with no markers classifies everything neutral.
    let permissive = LexiconPolarity::new(vec![]);
    let result = evaluate(
        &store,
        &cfg,
        &provider,
        &permissive,
        Some(&tenant.id),
        "store user passwords in plain text",
        None,
    )
    .unwrap();
    assert_eq!(result.matched.len(), 1);
    assert!(result.violations.is_empty());
}

#[test]
fn metadata_round_trips_into_the_log() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        None,
        "rotate credentials",
        Some(serde_json::json!({"agent": "ci-bot"})),
    )
    .unwrap();

    let rows = log::query_by_tenant(&store, None, None, None).unwrap();
    assert_eq!(rows[0].metadata.as_ref().unwrap()["agent"], "ci-bot");
}

#[test]
fn batch_preserves_input_order() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider = hash_provider(&cfg);

    let principle_id = seeded_principle(
        &store,
        &cfg,
        &provider,
        "Passwords must be encrypted at rest",
        "Security",
    );
    let tenant = create_tenant(&store, "Default", "default").unwrap();
    link_principle(&store, &tenant.id, &principle_id).unwrap();

    let actions = vec![
        "store user passwords in plain text".to_string(),
        "paint the office wall".to_string(),
        "log raw passwords for debugging".to_string(),
    ];
    let results = evaluate_batch(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        Some(&tenant.id),
        &actions,
        None,
    )
    .unwrap();

    assert_eq!(results.len(), 3);
    for (action, result) in actions.iter().zip(results.iter()) {
        assert_eq!(&result.action, action);
    }
    assert!(!results[0].matched.is_empty());
    assert!(results[1].matched.is_empty());
    assert_eq!(log::count(&store).unwrap(), 3);
}
