//! Principle Store: canonical policy statements and their embeddings.
//!
//! Principle text is immutable after creation; a changed statement is a
//! new principle. Deactivation is the only retirement path, so audit
//! history never loses its referent.

use crate::core::broker::DbBroker;
use crate::core::config::CharterConfig;
use crate::core::db;
use crate::core::error::CharterError;
use crate::core::store::Store;
use crate::core::time;
use crate::engine::embedding::{self, EmbeddingProvider};
use crate::engine::matcher::{self, CandidateScope, ScoredPrinciple};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principle {
    pub id: String,
    pub body: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub active: bool,
    pub created_at: String,
}

pub(crate) fn row_to_principle(row: &Row) -> rusqlite::Result<Principle> {
    let blob: Option<Vec<u8>> = row.get("embedding")?;
    Ok(Principle {
        id: row.get("id")?,
        body: row.get("body")?,
        category: row.get("category")?,
        embedding: blob.map(|b| embedding::bytes_to_vec(&b)),
        active: row.get::<_, i64>("active")? != 0,
        created_at: row.get("created_at")?,
    })
}

const PRINCIPLE_COLUMNS: &str = "id, body, category, embedding, active, created_at";

pub fn content_hash(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn create_principle(
    store: &Store,
    body: &str,
    category: &str,
) -> Result<Principle, CharterError> {
    if body.trim().is_empty() {
        return Err(CharterError::Validation(
            "principle body must not be empty".to_string(),
        ));
    }
    if category.trim().is_empty() {
        return Err(CharterError::Validation(
            "principle category must not be empty".to_string(),
        ));
    }

    let principle = Principle {
        id: time::new_id(),
        body: body.trim().to_string(),
        category: category.trim().to_string(),
        embedding: None,
        active: true,
        created_at: time::now_epoch_z(),
    };

    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "principle.create", |conn| {
        conn.execute(
            "INSERT INTO principles(id, body, category, active, created_at)
             VALUES(?1, ?2, ?3, 1, ?4)",
            params![
                principle.id,
                principle.body,
                principle.category,
                principle.created_at
            ],
        )?;
        Ok(())
    })?;

    Ok(principle)
}

pub fn get_principle(store: &Store, id: &str) -> Result<Principle, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "principle.get", |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM principles WHERE id = ?1",
            PRINCIPLE_COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_principle)?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Err(CharterError::NotFound(format!("principle '{}'", id))),
        }
    })
}

/// Store an embedding for a principle. Idempotent: re-writing the same
/// vector is a no-op in effect. The vector is bound as a typed BLOB
/// parameter; dimension is validated before the write, never truncated.
pub fn set_embedding(
    store: &Store,
    cfg: &CharterConfig,
    id: &str,
    vector: &[f32],
) -> Result<(), CharterError> {
    if vector.len() != cfg.embedding.dimensions {
        return Err(CharterError::DimensionMismatch {
            expected: cfg.embedding.dimensions,
            got: vector.len(),
        });
    }

    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "principle.set_embedding", |conn| {
        use rusqlite::OptionalExtension;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM principles WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Err(CharterError::NotFound(format!("principle '{}'", id)));
        };
        let hash = content_hash(&body);
        conn.execute(
            "UPDATE principles SET embedding = ?1, dims = ?2, content_hash = ?3 WHERE id = ?4",
            params![
                embedding::vec_to_bytes(vector),
                vector.len() as i64,
                hash,
                id
            ],
        )?;
        Ok(())
    })
}

/// All globally active principles, optionally filtered by category.
/// Ordered by id so pagination within a single call is stable.
pub fn list_active(
    store: &Store,
    category: Option<&str>,
) -> Result<Vec<Principle>, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "principle.list", |conn| {
        let mut out = Vec::new();
        match category {
            Some(cat) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM principles WHERE active = 1 AND category = ?1 ORDER BY id",
                    PRINCIPLE_COLUMNS
                ))?;
                let rows = stmt.query_map(params![cat], row_to_principle)?;
                for r in rows {
                    out.push(r?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM principles WHERE active = 1 ORDER BY id",
                    PRINCIPLE_COLUMNS
                ))?;
                let rows = stmt.query_map([], row_to_principle)?;
                for r in rows {
                    out.push(r?);
                }
            }
        }
        Ok(out)
    })
}

/// Retire a principle. Embeddings and tenant links are untouched; the
/// principle simply stops being in effect everywhere.
pub fn deactivate(store: &Store, id: &str) -> Result<(), CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    broker.with_conn(&db_path, "charter", "principle.deactivate", |conn| {
        let changed = conn.execute(
            "UPDATE principles SET active = 0 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(CharterError::NotFound(format!("principle '{}'", id)));
        }
        Ok(())
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedEntry {
    pub body: String,
    pub category: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SeedReport {
    pub created: Vec<String>,
    pub embedded: usize,
    /// Principles created without an embedding because the provider
    /// failed. They exist but are excluded from matching until
    /// `reembed_missing` succeeds.
    pub unembedded: Vec<String>,
}

/// Bulk-create principles and embed them best-effort. Seeding tolerates
/// provider failures (the row survives without a vector); evaluation
/// does not.
pub fn seed_principles(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
    entries: &[SeedEntry],
) -> Result<SeedReport, CharterError> {
    let mut report = SeedReport::default();
    for entry in entries {
        let principle = create_principle(store, &entry.body, &entry.category)?;
        match embedding::embed_with_timeout(provider, &principle.body, cfg.provider_timeout()) {
            Ok(vector) => {
                set_embedding(store, cfg, &principle.id, &vector)?;
                report.embedded += 1;
            }
            Err(_) => report.unembedded.push(principle.id.clone()),
        }
        report.created.push(principle.id);
    }
    Ok(report)
}

/// Embed every active principle that has no vector yet, or whose body
/// hash no longer matches the hash recorded at embed time.
pub fn reembed_missing(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
) -> Result<usize, CharterError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::charter_db_path(&store.root);
    let pending: Vec<(String, String)> =
        broker.with_conn(&db_path, "charter", "principle.reembed_scan", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, body, content_hash FROM principles WHERE active = 1",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;
            let mut out = Vec::new();
            for r in rows {
                let (id, body, hash) = r?;
                if hash.as_deref() != Some(content_hash(&body).as_str()) {
                    out.push((id, body));
                }
            }
            Ok(out)
        })?;

    let mut updated = 0;
    for (id, body) in pending {
        let vector = embedding::embed_with_timeout(provider, &body, cfg.provider_timeout())?;
        set_embedding(store, cfg, &id, &vector)?;
        updated += 1;
    }
    Ok(updated)
}

/// Semantic search over the global active set. Same ranking contract as
/// the evaluator's matcher pass, scoped to everything.
pub fn search_principles(
    store: &Store,
    cfg: &CharterConfig,
    provider: &Arc<dyn EmbeddingProvider>,
    query: &str,
    limit: usize,
    threshold: f64,
) -> Result<Vec<ScoredPrinciple>, CharterError> {
    if query.trim().is_empty() {
        return Err(CharterError::Validation(
            "search query must not be empty".to_string(),
        ));
    }
    let vector = embedding::embed_with_timeout(provider, query, cfg.provider_timeout())?;
    let ranking = matcher::rank(store, &CandidateScope::Global, &vector, threshold)?;
    Ok(ranking.matched().iter().take(limit).cloned().collect())
}
