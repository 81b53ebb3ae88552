//! Evaluation Log: append-only audit trail of every evaluation.
//!
//! `append` is the only mutation; no update or delete path exists in
//! this module by construction. Queries re-execute per call and order
//! by `created_at`, which is the only ordering contract evaluations
//! carry (concurrent requests may interleave in log order).

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::CharterError;
use crate::core::store::Store;
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub id: String,
    pub tenant_id: Option<String>,
    pub action: String,
    pub result: JsonValue,
    pub score: Option<f64>,
    pub metadata: Option<JsonValue>,
    pub created_at: String,
}

fn row_to_entry(row: &Row) -> rusqlite::Result<EvaluationRow> {
    let result_raw: String = row.get("result")?;
    let metadata_raw: Option<String> = row.get("metadata")?;
    Ok(EvaluationRow {
        id: row.get("id")?,
        tenant_id: row.get("tenant_id")?,
        action: row.get("action")?,
        result: serde_json::from_str(&result_raw).unwrap_or(JsonValue::Null),
        score: row.get("score")?,
        metadata: metadata_raw.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: row.get("created_at")?,
    })
}

/// Persist one evaluation. All-or-nothing: a cancelled evaluation that
/// never reaches this call leaves no partial row behind.
pub fn append(store: &Store, entry: &EvaluationRow) -> Result<(), CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    let result_raw = serde_json::to_string(&entry.result)
        .map_err(|e| CharterError::Validation(format!("result serialize: {}", e)))?;
    let metadata_raw = match &entry.metadata {
        Some(m) => Some(
            serde_json::to_string(m)
                .map_err(|e| CharterError::Validation(format!("metadata serialize: {}", e)))?,
        ),
        None => None,
    };

    broker.with_conn(&db_path, "charter", "log.append", |conn| {
        conn.execute(
            "INSERT INTO evaluations(id, tenant_id, action, result, score, metadata, created_at)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id,
                entry.tenant_id,
                entry.action,
                result_raw,
                entry.score,
                metadata_raw,
                entry.created_at
            ],
        )?;
        Ok(())
    })
}

/// Evaluations for one tenant (or the untenanted/orphaned rows when
/// `tenant_id` is `None`), ordered by `created_at` ascending. The
/// optional bounds are inclusive epoch-`Z` timestamps.
pub fn query_by_tenant(
    store: &Store,
    tenant_id: Option<&str>,
    since: Option<&str>,
    until: Option<&str>,
) -> Result<Vec<EvaluationRow>, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "log.query", |conn| {
        let mut sql = String::from(
            "SELECT id, tenant_id, action, result, score, metadata, created_at
             FROM evaluations WHERE ",
        );
        let mut binds: Vec<&str> = Vec::new();
        match tenant_id {
            Some(id) => {
                sql.push_str("tenant_id = ?1");
                binds.push(id);
            }
            None => sql.push_str("tenant_id IS NULL"),
        }
        if let Some(s) = since {
            sql.push_str(&format!(" AND created_at >= ?{}", binds.len() + 1));
            binds.push(s);
        }
        if let Some(u) = until {
            sql.push_str(&format!(" AND created_at <= ?{}", binds.len() + 1));
            binds.push(u);
        }
        sql.push_str(" ORDER BY created_at ASC, id ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(binds.iter()), row_to_entry)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Most recent evaluations across all tenants, newest first.
pub fn recent(store: &Store, limit: usize) -> Result<Vec<EvaluationRow>, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "log.recent", |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, action, result, score, metadata, created_at
             FROM evaluations ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_entry)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

/// Row count, for the status surface.
pub fn count(store: &Store) -> Result<i64, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "log.count", |conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM evaluations", [], |row| row.get(0))?)
    })
}
