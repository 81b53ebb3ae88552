use charter::core::config::CharterConfig;
use charter::core::db;
use charter::core::store::Store;
use charter::engine::embedding::{EmbeddingProvider, HashBucketProvider};
use charter::engine::evaluator::evaluate;
use charter::engine::log::{EvaluationRow, append, count, query_by_tenant, recent};
use charter::engine::polarity::NeutralPolarity;
use charter::engine::tenants::{create_tenant, remove_tenant};
use std::sync::Arc;
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path());
    db::initialize_db(&store.root).unwrap();
    (tmp, store)
}

fn entry(id: &str, tenant_id: Option<&str>, created_at: &str) -> EvaluationRow {
    EvaluationRow {
        id: id.to_string(),
        tenant_id: tenant_id.map(|s| s.to_string()),
        action: format!("action {}", id),
        result: serde_json::json!({"verdict": "scored"}),
        score: Some(0.5),
        metadata: None,
        created_at: created_at.to_string(),
    }
}

#[test]
fn query_orders_by_created_at_ascending() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();

    append(&store, &entry("01C", Some(&tenant.id), "1700000300Z")).unwrap();
    append(&store, &entry("01A", Some(&tenant.id), "1700000100Z")).unwrap();
    append(&store, &entry("01B", Some(&tenant.id), "1700000200Z")).unwrap();

    let rows = query_by_tenant(&store, Some(&tenant.id), None, None).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["01A", "01B", "01C"]);
}

#[test]
fn time_range_bounds_are_inclusive() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    append(&store, &entry("01A", Some(&tenant.id), "1700000100Z")).unwrap();
    append(&store, &entry("01B", Some(&tenant.id), "1700000200Z")).unwrap();
    append(&store, &entry("01C", Some(&tenant.id), "1700000300Z")).unwrap();

    let rows = query_by_tenant(
        &store,
        Some(&tenant.id),
        Some("1700000200Z"),
        Some("1700000300Z"),
    )
    .unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["01B", "01C"]);
}

#[test]
fn removing_a_tenant_preserves_its_history() {
    let (_tmp, store) = test_store();
    let cfg = CharterConfig::default();
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(HashBucketProvider::new(cfg.embedding.dimensions));
    let tenant = create_tenant(&store, "Doomed", "doomed").unwrap();

    evaluate(
        &store,
        &cfg,
        &provider,
        &NeutralPolarity,
        Some(&tenant.id),
        "archive customer exports",
        None,
    )
    .unwrap();
    assert_eq!(count(&store).unwrap(), 1);

    remove_tenant(&store, &tenant.id).unwrap();

    // The row survives with the tenant reference nulled by the FK.
    assert_eq!(count(&store).unwrap(), 1);
    let orphaned = query_by_tenant(&store, None, None, None).unwrap();
    assert_eq!(orphaned.len(), 1);
    assert_eq!(orphaned[0].action, "archive customer exports");
    assert_eq!(orphaned[0].tenant_id, None);
    assert!(query_by_tenant(&store, Some(&tenant.id), None, None)
        .unwrap()
        .is_empty());
}

#[test]
fn recent_returns_newest_first_with_limit() {
    let (_tmp, store) = test_store();
    append(&store, &entry("01A", None, "1700000100Z")).unwrap();
    append(&store, &entry("01B", None, "1700000200Z")).unwrap();
    append(&store, &entry("01C", None, "1700000300Z")).unwrap();

    let rows = recent(&store, 2).unwrap();
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["01C", "01B"]);
}

#[test]
fn result_json_round_trips() {
    let (_tmp, store) = test_store();
    let mut e = entry("01A", None, "1700000100Z");
    e.result = serde_json::json!({"verdict": "scored", "matched": [{"principle_id": "01P"}]});
    append(&store, &e).unwrap();

    let rows = query_by_tenant(&store, None, None, None).unwrap();
    assert_eq!(rows[0].result["matched"][0]["principle_id"], "01P");
    assert_eq!(rows[0].score, Some(0.5));
}
