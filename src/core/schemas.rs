//! Database schema definitions for the Charter consolidated bin.
//!
//! Charter keeps all engine state in a single SQLite database,
//! `charter.db`, under the store root. Table creation order matters:
//! `principles` and `tenants` must exist before the join table, and the
//! join table before `evaluations` (see [`ALL_SCHEMAS`]).

pub const CHARTER_DB_NAME: &str = "charter.db";

pub const PRINCIPLES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS principles (
        id TEXT PRIMARY KEY,
        body TEXT NOT NULL,
        category TEXT NOT NULL,
        embedding BLOB,          -- little-endian f32 bytes, bound parameter only
        dims INTEGER,
        content_hash TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
";

pub const PRINCIPLES_CATEGORY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_principles_category ON principles(category)";

pub const TENANTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tenants (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
";

pub const TENANT_PRINCIPLES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tenant_principles (
        tenant_id TEXT NOT NULL,
        principle_id TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY(tenant_id, principle_id),
        FOREIGN KEY(tenant_id) REFERENCES tenants(id) ON DELETE RESTRICT,
        FOREIGN KEY(principle_id) REFERENCES principles(id) ON DELETE RESTRICT
    )
";

/// Evaluations are append-only. The tenant reference is SET NULL on
/// delete so removing a tenant never erases its audit history.
pub const EVALUATIONS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS evaluations (
        id TEXT PRIMARY KEY,
        tenant_id TEXT,
        action TEXT NOT NULL,
        result TEXT NOT NULL,    -- JSON verdict
        score REAL,              -- NULL when the verdict is 'unknown'
        metadata TEXT,           -- free-form JSON
        created_at TEXT NOT NULL,
        FOREIGN KEY(tenant_id) REFERENCES tenants(id) ON DELETE SET NULL
    )
";

pub const EVALUATIONS_TENANT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_evaluations_tenant ON evaluations(tenant_id, created_at)";

/// All DDL statements in dependency order.
pub const ALL_SCHEMAS: &[&str] = &[
    PRINCIPLES_SCHEMA,
    PRINCIPLES_CATEGORY_INDEX,
    TENANTS_SCHEMA,
    TENANT_PRINCIPLES_SCHEMA,
    EVALUATIONS_SCHEMA,
    EVALUATIONS_TENANT_INDEX,
];
