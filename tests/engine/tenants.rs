use charter::core::db;
use charter::core::error::CharterError;
use charter::core::store::Store;
use charter::engine::principles::{create_principle, deactivate};
use charter::engine::tenants::{
    active_principles_for, create_tenant, get_tenant_by_slug, link_principle, list_tenants,
    remove_tenant, unlink_principle,
};
use tempfile::tempdir;

fn test_store() -> (tempfile::TempDir, Store) {
    let tmp = tempdir().unwrap();
    let store = Store::at(tmp.path());
    db::initialize_db(&store.root).unwrap();
    (tmp, store)
}

fn link_row_count(store: &Store, tenant_id: &str, principle_id: &str) -> i64 {
    let conn = rusqlite::Connection::open(store.root.join("charter.db")).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM tenant_principles WHERE tenant_id = ?1 AND principle_id = ?2",
        rusqlite::params![tenant_id, principle_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn slug_must_be_unique_and_well_formed() {
    let (_tmp, store) = test_store();
    create_tenant(&store, "Acme", "acme").unwrap();
    assert!(matches!(
        create_tenant(&store, "Acme Again", "acme"),
        Err(CharterError::Conflict(_))
    ));
    assert!(matches!(
        create_tenant(&store, "Bad", "Not A Slug"),
        Err(CharterError::Validation(_))
    ));
    assert!(matches!(
        create_tenant(&store, "", "empty-name"),
        Err(CharterError::Validation(_))
    ));

    let found = get_tenant_by_slug(&store, "acme").unwrap();
    assert_eq!(found.name, "Acme");
    assert_eq!(list_tenants(&store).unwrap().len(), 1);
}

#[test]
fn link_is_idempotent_upsert() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    let principle = create_principle(&store, "Passwords must be encrypted", "Security").unwrap();

    link_principle(&store, &tenant.id, &principle.id).unwrap();
    link_principle(&store, &tenant.id, &principle.id).unwrap();

    // Exactly one row, and the principle is in effect.
    assert_eq!(link_row_count(&store, &tenant.id, &principle.id), 1);
    let in_effect = active_principles_for(&store, &tenant.id).unwrap();
    assert_eq!(in_effect.len(), 1);
    assert_eq!(in_effect[0].id, principle.id);
}

#[test]
fn unlink_then_relink_restores_visibility_without_duplicates() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    let principle = create_principle(&store, "PII must not be logged", "Privacy").unwrap();

    link_principle(&store, &tenant.id, &principle.id).unwrap();
    unlink_principle(&store, &tenant.id, &principle.id).unwrap();

    // Row retained for history, principle no longer in effect.
    assert_eq!(link_row_count(&store, &tenant.id, &principle.id), 1);
    assert!(active_principles_for(&store, &tenant.id).unwrap().is_empty());

    link_principle(&store, &tenant.id, &principle.id).unwrap();
    assert_eq!(link_row_count(&store, &tenant.id, &principle.id), 1);
    assert_eq!(active_principles_for(&store, &tenant.id).unwrap().len(), 1);
}

#[test]
fn link_requires_existing_tenant_and_principle() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    let principle = create_principle(&store, "Sessions must expire", "Security").unwrap();

    assert!(matches!(
        link_principle(&store, "01MISSING", &principle.id),
        Err(CharterError::NotFound(_))
    ));
    assert!(matches!(
        link_principle(&store, &tenant.id, "01MISSING"),
        Err(CharterError::NotFound(_))
    ));
    assert!(matches!(
        unlink_principle(&store, &tenant.id, &principle.id),
        Err(CharterError::NotFound(_))
    ));
}

#[test]
fn globally_inactive_principles_never_surface_for_tenants() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    let principle = create_principle(&store, "Sessions must expire", "Security").unwrap();
    link_principle(&store, &tenant.id, &principle.id).unwrap();

    deactivate(&store, &principle.id).unwrap();

    // Link is still active, but the global flag wins.
    assert!(active_principles_for(&store, &tenant.id).unwrap().is_empty());
}

#[test]
fn empty_link_set_means_empty_candidates() {
    let (_tmp, store) = test_store();
    create_principle(&store, "Passwords must be encrypted", "Security").unwrap();
    let tenant = create_tenant(&store, "Fresh", "fresh").unwrap();

    // Never falls back to the global set.
    assert!(active_principles_for(&store, &tenant.id).unwrap().is_empty());
}

#[test]
fn remove_tenant_deletes_links_and_tenant_row() {
    let (_tmp, store) = test_store();
    let tenant = create_tenant(&store, "Acme", "acme").unwrap();
    let principle = create_principle(&store, "Passwords must be encrypted", "Security").unwrap();
    link_principle(&store, &tenant.id, &principle.id).unwrap();

    remove_tenant(&store, &tenant.id).unwrap();
    assert_eq!(link_row_count(&store, &tenant.id, &principle.id), 0);
    assert!(matches!(
        active_principles_for(&store, &tenant.id),
        Err(CharterError::NotFound(_))
    ));
    assert!(matches!(
        remove_tenant(&store, &tenant.id),
        Err(CharterError::NotFound(_))
    ));
}
