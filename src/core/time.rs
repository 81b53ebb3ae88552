//! Timestamp, id, and command-envelope helpers.

use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Unix-epoch seconds with a `Z` suffix (e.g. `1771220592Z`). Fixed
/// width until 2286, so lexicographic order equals chronological order.
pub fn now_epoch_z() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// ULIDs sort lexicographically by creation time; every row id in the
/// engine uses them, which is what makes the matcher's lower-id
/// tie-break deterministic and roughly chronological.
pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// Standard JSON envelope printed by every CLI command.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_epoch_z(),
        "event_id": new_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
