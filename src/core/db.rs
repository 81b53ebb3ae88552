use crate::core::broker::DbBroker;
use crate::core::error::CharterError;
use crate::core::schemas;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, CharterError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn charter_db_path(root: &Path) -> PathBuf {
    root.join(schemas::CHARTER_DB_NAME)
}

/// Create the store directory and all tables. Idempotent; the DDL is
/// executed in dependency order (base tables before the join table).
pub fn initialize_db(root: &Path) -> Result<(), CharterError> {
    fs::create_dir_all(root)?;
    let db_path = charter_db_path(root);

    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "charter", "db.init", |conn| {
        for ddl in schemas::ALL_SCHEMAS {
            conn.execute(ddl, [])?;
        }
        Ok(())
    })
}
