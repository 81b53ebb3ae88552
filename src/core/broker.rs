use crate::core::db;
use crate::core::error::CharterError;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the single write path for engine state. It
/// serializes access in-process and appends a structured event to
/// `broker.events.jsonl` for every operation, success or failure. This
/// operational audit log is distinct from the evaluation log table.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("broker.events.jsonl"),
        }
    }

    /// Execute a closure with a serialized connection to the named DB.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, CharterError>
    where
        F: FnOnce(&Connection) -> Result<R, CharterError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap();

        let db_id = db_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.write_event(actor, op_name, &db_id, status)?;

        result
    }

    /// Record an event without touching a database. Used for
    /// observability of failures that never reach storage, e.g. an
    /// embedding provider timeout before any write.
    pub fn note(&self, actor: &str, op: &str, status: &str) -> Result<(), CharterError> {
        self.write_event(actor, op, "-", status)
    }

    fn write_event(
        &self,
        actor: &str,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), CharterError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };

        if let Some(parent) = self.audit_log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        let line = serde_json::to_string(&ev)
            .map_err(|e| CharterError::Validation(format!("broker event serialize: {}", e)))?;
        writeln!(f, "{}", line)?;
        Ok(())
    }
}
