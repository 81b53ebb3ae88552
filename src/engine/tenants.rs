//! Tenant Registry: tenant identities and per-tenant principle links.
//!
//! A principle is in effect for a tenant only when both the principle's
//! global flag and the link's flag are active. Links are never deleted
//! by unlink; the row records that the tenant once enabled the
//! principle.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::CharterError;
use crate::core::store::Store;
use crate::core::time;
use crate::engine::principles::{self, Principle};
use regex::Regex;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub created_at: String,
}

fn slug_pattern() -> Regex {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap()
}

pub fn create_tenant(store: &Store, name: &str, slug: &str) -> Result<Tenant, CharterError> {
    if name.trim().is_empty() {
        return Err(CharterError::Validation(
            "tenant name must not be empty".to_string(),
        ));
    }
    if !slug_pattern().is_match(slug) {
        return Err(CharterError::Validation(format!(
            "invalid slug '{}': expected lowercase letters, digits, hyphens",
            slug
        )));
    }

    let tenant = Tenant {
        id: time::new_id(),
        name: name.trim().to_string(),
        slug: slug.to_string(),
        active: true,
        created_at: time::now_epoch_z(),
    };

    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "tenant.create", |conn| {
        let inserted = conn.execute(
            "INSERT INTO tenants(id, name, slug, active, created_at) VALUES(?1, ?2, ?3, 1, ?4)",
            params![tenant.id, tenant.name, tenant.slug, tenant.created_at],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(CharterError::Conflict(format!(
                    "tenant slug '{}' already exists",
                    tenant.slug
                )))
            }
            Err(e) => Err(e.into()),
        }
    })?;

    Ok(tenant)
}

pub fn get_tenant(store: &Store, id: &str) -> Result<Tenant, CharterError> {
    tenant_query(store, "id", id)
}

pub fn get_tenant_by_slug(store: &Store, slug: &str) -> Result<Tenant, CharterError> {
    tenant_query(store, "slug", slug)
}

fn tenant_query(store: &Store, column: &str, value: &str) -> Result<Tenant, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "tenant.get", |conn| {
        use rusqlite::OptionalExtension;
        let found = conn
            .query_row(
                &format!(
                    "SELECT id, name, slug, active, created_at FROM tenants WHERE {} = ?1",
                    column
                ),
                params![value],
                |row| {
                    Ok(Tenant {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        slug: row.get(2)?,
                        active: row.get::<_, i64>(3)? != 0,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        found.ok_or_else(|| CharterError::NotFound(format!("tenant '{}'", value)))
    })
}

pub fn list_tenants(store: &Store) -> Result<Vec<Tenant>, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "tenant.list", |conn| {
        let mut stmt =
            conn.prepare("SELECT id, name, slug, active, created_at FROM tenants ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Tenant {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                active: row.get::<_, i64>(3)? != 0,
                created_at: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Enable a principle for a tenant. Upsert semantics: an existing link
/// (active or not) is reactivated rather than erroring, so a duplicate-
/// link race resolves to a single active row.
pub fn link_principle(
    store: &Store,
    tenant_id: &str,
    principle_id: &str,
) -> Result<(), CharterError> {
    get_tenant(store, tenant_id)?;
    principles::get_principle(store, principle_id)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    let now = time::now_epoch_z();
    broker.with_conn(&db_path, "charter", "tenant.link", |conn| {
        conn.execute(
            "INSERT INTO tenant_principles(tenant_id, principle_id, active, created_at, updated_at)
             VALUES(?1, ?2, 1, ?3, ?3)
             ON CONFLICT(tenant_id, principle_id)
             DO UPDATE SET active = 1, updated_at = excluded.updated_at",
            params![tenant_id, principle_id, now],
        )?;
        Ok(())
    })
}

/// Disable a principle for a tenant. The row is retained so history
/// shows the tenant once enabled it.
pub fn unlink_principle(
    store: &Store,
    tenant_id: &str,
    principle_id: &str,
) -> Result<(), CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    let now = time::now_epoch_z();
    broker.with_conn(&db_path, "charter", "tenant.unlink", |conn| {
        let changed = conn.execute(
            "UPDATE tenant_principles SET active = 0, updated_at = ?1
             WHERE tenant_id = ?2 AND principle_id = ?3",
            params![now, tenant_id, principle_id],
        )?;
        if changed == 0 {
            return Err(CharterError::NotFound(format!(
                "link ({}, {})",
                tenant_id, principle_id
            )));
        }
        Ok(())
    })
}

/// Principles in effect for a tenant: both the global and the link flag
/// must be active. Zero active links means an empty set, never a
/// fallback to the global principle set.
pub fn active_principles_for(
    store: &Store,
    tenant_id: &str,
) -> Result<Vec<Principle>, CharterError> {
    get_tenant(store, tenant_id)?;

    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "tenant.active_principles", |conn| {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.body, p.category, p.embedding, p.active, p.created_at
             FROM principles p
             JOIN tenant_principles tp ON tp.principle_id = p.id
             WHERE tp.tenant_id = ?1 AND tp.active = 1 AND p.active = 1
             ORDER BY p.id",
        )?;
        let rows = stmt.query_map(params![tenant_id], principles::row_to_principle)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Administrative hard delete. Removes the tenant's link rows and the
/// tenant row in one savepoint; the evaluations table keeps its rows
/// with the tenant reference nulled by the FK action.
pub fn remove_tenant(store: &Store, tenant_id: &str) -> Result<(), CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "tenant.remove", |conn| {
        conn.execute_batch("SAVEPOINT remove_tenant")?;
        let result = (|| -> Result<(), CharterError> {
            conn.execute(
                "DELETE FROM tenant_principles WHERE tenant_id = ?1",
                params![tenant_id],
            )?;
            let removed = conn.execute("DELETE FROM tenants WHERE id = ?1", params![tenant_id])?;
            if removed == 0 {
                return Err(CharterError::NotFound(format!("tenant '{}'", tenant_id)));
            }
            Ok(())
        })();
        match result {
            Ok(()) => {
                conn.execute_batch("RELEASE remove_tenant")?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO remove_tenant");
                let _ = conn.execute_batch("RELEASE remove_tenant");
                Err(e)
            }
        }
    })
}
