//! Pull/push/status engines.
//!
//! Each call is a stateless request-response exchange. Conflicting writes
//! are settled entirely by the store's per-row upsert: the last arrival
//! wins whole-row, earlier writes are discarded silently. Pull and push do
//! not coordinate; a pull may observe a concurrent push half-applied. The
//! batch in a push is not atomic across rows either, a store failure mid
//! batch leaves earlier rows written. Clients recover by re-pushing, which
//! upsert-by-id makes safe to repeat.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::audit::SyncAudit;
use super::registry::DeviceRegistry;
use super::tables::SyncTable;
use super::types::{PullRequest, PullResponse, PushResponse, StatusResponse, SyncOperation};
use crate::error::Result;
use crate::store::{format_timestamp, now_timestamp, Query, Row, Store};

/// Sentinel table name for audit entries covering a multi-table pull.
const PULL_AUDIT_TABLE: &str = "multiple";

/// Audit entries returned by a status call.
const STATUS_HISTORY_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct SyncEngine {
    store: Arc<dyn Store>,
    registry: DeviceRegistry,
    audit: SyncAudit,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            registry: DeviceRegistry::new(store.clone()),
            audit: SyncAudit::new(store.clone()),
            store,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Incremental download: every row of the requested tables owned by
    /// `user_id` with `updated_at` at or after the client's watermark.
    ///
    /// The returned watermark is the server clock before the table queries
    /// run. A row written while the queries execute may appear in both this
    /// response and the next one; clients apply rows idempotently.
    pub async fn pull(&self, user_id: &str, request: &PullRequest) -> Result<PullResponse> {
        match self.pull_inner(user_id, request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.audit
                    .record_best_effort(
                        user_id,
                        &request.device_id,
                        PULL_AUDIT_TABLE,
                        SyncOperation::Pull,
                        &err.to_string(),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn pull_inner(&self, user_id: &str, request: &PullRequest) -> Result<PullResponse> {
        self.registry
            .register_or_touch(user_id, &request.device_id, None, None)
            .await?;

        let tables: Vec<SyncTable> = if request.tables.is_empty() {
            SyncTable::ALL.to_vec()
        } else {
            request
                .tables
                .iter()
                .map(|name| SyncTable::from_name(name))
                .collect::<Result<_>>()?
        };

        // Watermark before the queries, not after: a row written while we
        // read lands on the next pull instead of falling into a gap.
        let watermark = Utc::now();

        let mut data = BTreeMap::new();
        let mut total = 0i64;
        for table in &tables {
            let mut query = Query::new().eq("user_id", user_id);
            if let Some(last_sync) = request.last_sync {
                query = query.gte("updated_at", format_timestamp(last_sync));
            }
            let rows = self.store.select(table.as_str(), query).await?;
            total += rows.len() as i64;
            data.insert(table.as_str().to_string(), rows);
        }

        self.audit
            .record(
                user_id,
                &request.device_id,
                PULL_AUDIT_TABLE,
                SyncOperation::Pull,
                total,
                true,
                None,
            )
            .await?;

        Ok(PullResponse {
            success: true,
            last_sync: watermark,
            data,
            conflicts: Vec::new(),
        })
    }

    /// Upload of client edits for one table, applied as upserts keyed by
    /// `id`. Ownership and freshness are server-assigned: `user_id` and
    /// `updated_at` overwrite whatever the client sent, the whole batch
    /// sharing one timestamp.
    pub async fn push(
        &self,
        user_id: &str,
        device_id: &str,
        table_name: &str,
        records: Vec<Row>,
    ) -> Result<PushResponse> {
        // The whitelist check runs before anything touches the store, so a
        // rejected table leaves no trace, not even an audit entry.
        let table = SyncTable::from_name(table_name)?;

        match self.push_inner(user_id, device_id, table, records).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.audit
                    .record_best_effort(
                        user_id,
                        device_id,
                        table.as_str(),
                        SyncOperation::Push,
                        &err.to_string(),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn push_inner(
        &self,
        user_id: &str,
        device_id: &str,
        table: SyncTable,
        records: Vec<Row>,
    ) -> Result<PushResponse> {
        let attempted = records.len() as i64;
        let stamp = now_timestamp();

        let rows: Vec<Row> = records
            .into_iter()
            .map(|mut row| {
                row.insert("user_id".to_string(), Value::String(user_id.to_string()));
                row.insert("updated_at".to_string(), Value::String(stamp.clone()));
                row
            })
            .collect();

        let synced = self.store.upsert(table.as_str(), rows, &["id"]).await?;

        self.audit
            .record(
                user_id,
                device_id,
                table.as_str(),
                SyncOperation::Push,
                attempted,
                true,
                None,
            )
            .await?;

        Ok(PushResponse {
            success: true,
            message: format!("Successfully synced {} records to {}", synced, table),
            synced_records: synced,
        })
    }

    /// Registry row and recent audit history for one device. Read-only; an
    /// unknown device is an empty result, not an error.
    pub async fn status(&self, user_id: &str, device_id: &str) -> Result<StatusResponse> {
        let device = self.registry.get(user_id, device_id).await?;
        let recent_syncs = self
            .audit
            .recent(user_id, device_id, STATUS_HISTORY_LIMIT)
            .await?;
        let last_sync = device.as_ref().and_then(|d| d.last_sync);

        Ok(StatusResponse {
            device,
            recent_syncs,
            last_sync,
        })
    }
}
