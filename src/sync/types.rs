//! Wire types for the sync endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Device;
use crate::store::Row;

/// Body of `POST /sync/pull`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub device_id: String,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    /// Table names to pull. Empty means every syncable table.
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Response of `POST /sync/pull`.
///
/// `last_sync` is the watermark clients must send on their next pull. It is
/// captured before the table queries run, so rows written mid-pull are
/// re-delivered next time instead of being skipped.
#[derive(Debug, Serialize, Deserialize)]
pub struct PullResponse {
    pub success: bool,
    pub last_sync: DateTime<Utc>,
    pub data: BTreeMap<String, Vec<Row>>,
    /// Reserved. Last-write-wins resolution never reports conflicts.
    pub conflicts: Vec<Value>,
}

/// Query parameters of `POST /sync/push`; the record batch rides in the body.
#[derive(Debug, Deserialize)]
pub struct PushParams {
    pub table_name: String,
    pub device_id: String,
}

/// Response of `POST /sync/push`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub success: bool,
    pub message: String,
    pub synced_records: u64,
}

/// Query parameters of `GET /sync/status`.
#[derive(Debug, Deserialize)]
pub struct StatusParams {
    pub device_id: String,
}

/// Response of `GET /sync/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub device: Option<Device>,
    pub recent_syncs: Vec<SyncLogEntry>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Direction of a sync exchange, as recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Pull,
    Push,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Pull => "pull",
            SyncOperation::Push => "push",
        }
    }
}

/// One row of the append-only sync audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub user_id: String,
    pub device_id: String,
    pub table_name: String,
    pub operation: SyncOperation,
    pub records_count: i64,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pull_request_defaults_tables_to_empty() {
        let req: PullRequest = serde_json::from_value(json!({"device_id": "phone"})).unwrap();
        assert!(req.last_sync.is_none());
        assert!(req.tables.is_empty());
    }

    #[test]
    fn operations_serialize_lowercase() {
        assert_eq!(serde_json::to_value(SyncOperation::Pull).unwrap(), json!("pull"));
        assert_eq!(serde_json::to_value(SyncOperation::Push).unwrap(), json!("push"));
    }

    #[test]
    fn log_entries_decode_from_audit_rows() {
        let entry: SyncLogEntry = serde_json::from_value(json!({
            "user_id": "u1",
            "device_id": "phone",
            "table_name": "multiple",
            "operation": "pull",
            "records_count": 3,
            "success": true,
            "error_message": null,
            "created_at": "2026-02-01T08:00:00.000000Z"
        }))
        .unwrap();
        assert_eq!(entry.operation, SyncOperation::Pull);
        assert!(entry.success);
        assert!(entry.error_message.is_none());
    }
}
