//! Append-only audit log of sync exchanges.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::types::{SyncLogEntry, SyncOperation};
use crate::error::Result;
use crate::models;
use crate::store::{now_timestamp, Query, Row, Store};

#[derive(Clone)]
pub struct SyncAudit {
    store: Arc<dyn Store>,
}

impl SyncAudit {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append one entry. Callers on the success path treat a failed append
    /// as a failure of the whole exchange.
    pub async fn record(
        &self,
        user_id: &str,
        device_id: &str,
        table_name: &str,
        operation: SyncOperation,
        records_count: i64,
        success: bool,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut row = Row::new();
        row.insert("user_id".to_string(), Value::String(user_id.to_string()));
        row.insert("device_id".to_string(), Value::String(device_id.to_string()));
        row.insert("table_name".to_string(), Value::String(table_name.to_string()));
        row.insert(
            "operation".to_string(),
            Value::String(operation.as_str().to_string()),
        );
        row.insert("records_count".to_string(), Value::from(records_count));
        row.insert("success".to_string(), Value::Bool(success));
        if let Some(message) = error_message {
            row.insert("error_message".to_string(), Value::String(message.to_string()));
        }
        row.insert("created_at".to_string(), Value::String(now_timestamp()));

        self.store.insert("sync_logs", vec![row]).await?;
        Ok(())
    }

    /// Append an entry for an exchange that already failed. A broken audit
    /// log must not hide the original failure from the client, so the append
    /// error is logged and dropped.
    pub async fn record_best_effort(
        &self,
        user_id: &str,
        device_id: &str,
        table_name: &str,
        operation: SyncOperation,
        error_message: &str,
    ) {
        if let Err(err) = self
            .record(
                user_id,
                device_id,
                table_name,
                operation,
                0,
                false,
                Some(error_message),
            )
            .await
        {
            warn!(
                user_id,
                device_id,
                error = %err,
                "failed to record sync failure in audit log"
            );
        }
    }

    /// Latest entries for one device, newest first.
    pub async fn recent(
        &self,
        user_id: &str,
        device_id: &str,
        limit: u32,
    ) -> Result<Vec<SyncLogEntry>> {
        let rows = self
            .store
            .select(
                "sync_logs",
                Query::new()
                    .eq("user_id", user_id)
                    .eq("device_id", device_id)
                    .order("created_at", true)
                    .limit(limit),
            )
            .await?;
        rows.into_iter().map(models::from_row).collect()
    }
}
