//! In-memory store for tests
//!
//! Keeps rows as flat maps per table and mirrors the SQLite store's write
//! semantics, including whole-payload replacement on document-table upserts.
//! Tables can be marked unavailable to exercise failure paths.

use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::{apply_defaults, now_timestamp, table_spec, Filter, FilterOp, Query, Row, Store};
use crate::error::StoreError;
use async_trait::async_trait;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    unavailable: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a table unavailable. Calls touching it fail with
    /// [`StoreError::Unavailable`] until restored.
    pub fn fail_table(&self, table: &str) {
        self.unavailable.write().insert(table.to_string());
    }

    pub fn restore_table(&self, table: &str) {
        self.unavailable.write().remove(table);
    }

    fn check_available(&self, table: &str) -> Result<(), StoreError> {
        if self.unavailable.read().contains(table) {
            return Err(StoreError::Unavailable(format!(
                "table {} is unavailable",
                table
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Row>, StoreError> {
        let spec = table_spec(table)?;
        self.check_available(table)?;

        let tables = self.tables.read();
        let mut rows: Vec<Row> = tables
            .get(spec.name)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(row, f)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_rows(&mut rows, &query.order_by);
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }

        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let spec = table_spec(table)?;
        self.check_available(table)?;

        let mut stored = Vec::with_capacity(rows.len());
        let mut tables = self.tables.write();
        let entries = tables.entry(spec.name.to_string()).or_default();
        for row in rows {
            check_columns(spec, &row)?;
            let row = apply_defaults(spec, row);
            entries.push(row.clone());
            stored.push(row);
        }

        Ok(stored)
    }

    async fn update(
        &self,
        table: &str,
        changes: Row,
        filters: Vec<Filter>,
    ) -> Result<u64, StoreError> {
        let spec = table_spec(table)?;
        self.check_available(table)?;
        check_columns(spec, &changes)?;

        let stamp = (spec.document && !changes.contains_key("updated_at"))
            .then(now_timestamp);

        let mut affected = 0u64;
        let mut tables = self.tables.write();
        if let Some(rows) = tables.get_mut(spec.name) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| matches(row, f)))
            {
                for (key, value) in &changes {
                    row.insert(key.clone(), value.clone());
                }
                if let Some(ts) = &stamp {
                    row.insert("updated_at".to_string(), Value::String(ts.clone()));
                }
                affected += 1;
            }
        }

        Ok(affected)
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_keys: &[&str],
    ) -> Result<u64, StoreError> {
        let spec = table_spec(table)?;
        self.check_available(table)?;
        for key in conflict_keys {
            if !spec.has_column(key) {
                return Err(StoreError::UnknownColumn {
                    table: spec.name.to_string(),
                    column: key.to_string(),
                });
            }
        }

        let mut affected = 0u64;
        let mut tables = self.tables.write();
        let entries = tables.entry(spec.name.to_string()).or_default();
        for row in rows {
            check_columns(spec, &row)?;
            let row = apply_defaults(spec, row);

            let existing = entries.iter_mut().find(|candidate| {
                conflict_keys
                    .iter()
                    .all(|key| candidate.get(*key) == row.get(*key))
            });

            match existing {
                Some(stored) => {
                    if spec.document {
                        // Whole-payload replacement, created_at assigned once.
                        let created = stored.get("created_at").cloned();
                        *stored = row;
                        if let Some(created) = created {
                            stored.insert("created_at".to_string(), created);
                        }
                    } else {
                        for (key, value) in row {
                            if key == "created_at" {
                                continue;
                            }
                            stored.insert(key, value);
                        }
                    }
                }
                None => entries.push(row),
            }
            affected += 1;
        }

        Ok(affected)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let spec = table_spec(table)?;
        self.check_available(table)?;

        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(spec.name) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|f| matches(row, f)));

        Ok((before - rows.len()) as u64)
    }
}

fn check_columns(spec: &super::TableSpec, row: &Row) -> Result<(), StoreError> {
    if spec.document {
        return Ok(());
    }
    match row.keys().find(|key| !spec.has_column(key)) {
        Some(key) => Err(StoreError::UnknownColumn {
            table: spec.name.to_string(),
            column: key.clone(),
        }),
        None => Ok(()),
    }
}

fn matches(row: &Row, filter: &Filter) -> bool {
    let value = row.get(&filter.column).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => value == &filter.value,
        FilterOp::Gte => compare(value, &filter.value).map_or(false, Ordering::is_ge),
        FilterOp::Lte => compare(value, &filter.value).map_or(false, Ordering::is_le),
    }
}

/// Null sorts below everything, matching SQLite.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_rows(rows: &mut [Row], order_by: &[(String, bool)]) {
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (column, descending) in order_by {
            let ord = compare(
                a.get(column).unwrap_or(&Value::Null),
                b.get(column).unwrap_or(&Value::Null),
            )
            .unwrap_or(Ordering::Equal);
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_and_select_roundtrip() {
        let store = MemoryStore::new();

        store
            .insert("tasks", vec![row(json!({"user_id": "u1", "title": "t"}))])
            .await
            .unwrap();

        let rows = store
            .select("tasks", Query::new().eq("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["id"].is_string());
    }

    #[tokio::test]
    async fn watermark_filter_is_inclusive() {
        let store = MemoryStore::new();
        for stamp in [
            "2026-01-01T00:00:00.000000Z",
            "2026-01-02T00:00:00.000000Z",
            "2026-01-03T00:00:00.000000Z",
        ] {
            store
                .insert(
                    "tasks",
                    vec![row(json!({"user_id": "u1", "updated_at": stamp}))],
                )
                .await
                .unwrap();
        }

        let rows = store
            .select(
                "tasks",
                Query::new().gte("updated_at", "2026-01-02T00:00:00.000000Z"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn document_upsert_matches_sqlite_semantics() {
        let store = MemoryStore::new();

        store
            .upsert(
                "tasks",
                vec![row(json!({
                    "id": "t1",
                    "user_id": "u1",
                    "title": "X",
                    "notes": "draft",
                    "created_at": "2026-01-01T00:00:00.000000Z"
                }))],
                &["id"],
            )
            .await
            .unwrap();

        let affected = store
            .upsert(
                "tasks",
                vec![row(json!({"id": "t1", "user_id": "u1", "title": "Y"}))],
                &["id"],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = store.select("tasks", Query::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("Y"));
        assert!(rows[0].get("notes").is_none());
        assert_eq!(rows[0]["created_at"], json!("2026-01-01T00:00:00.000000Z"));
    }

    #[tokio::test]
    async fn device_upsert_keeps_absent_metadata() {
        let store = MemoryStore::new();

        store
            .upsert(
                "user_devices",
                vec![row(json!({
                    "user_id": "u1",
                    "device_id": "d1",
                    "device_name": "Phone",
                    "is_active": true
                }))],
                &["user_id", "device_id"],
            )
            .await
            .unwrap();

        store
            .upsert(
                "user_devices",
                vec![row(json!({"user_id": "u1", "device_id": "d1", "is_active": true}))],
                &["user_id", "device_id"],
            )
            .await
            .unwrap();

        let rows = store.select("user_devices", Query::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["device_name"], json!("Phone"));
    }

    #[tokio::test]
    async fn ordering_and_limit() {
        let store = MemoryStore::new();
        for (device, stamp) in [
            ("d1", "2026-01-01T00:00:00.000000Z"),
            ("d2", "2026-01-03T00:00:00.000000Z"),
            ("d3", "2026-01-02T00:00:00.000000Z"),
        ] {
            store
                .insert(
                    "user_devices",
                    vec![row(json!({
                        "user_id": "u1",
                        "device_id": device,
                        "is_active": true,
                        "last_sync": stamp
                    }))],
                )
                .await
                .unwrap();
        }

        let rows = store
            .select(
                "user_devices",
                Query::new().order("last_sync", true).limit(2),
            )
            .await
            .unwrap();
        assert_eq!(rows[0]["device_id"], json!("d2"));
        assert_eq!(rows[1]["device_id"], json!("d3"));
    }

    #[tokio::test]
    async fn failed_tables_surface_unavailable() {
        let store = MemoryStore::new();
        store.fail_table("tasks");

        let err = store.select("tasks", Query::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        store.restore_table("tasks");
        assert!(store.select("tasks", Query::new()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_columns_rejected_on_fixed_tables() {
        let store = MemoryStore::new();
        let err = store
            .insert(
                "user_devices",
                vec![row(json!({"user_id": "u1", "device_id": "d1", "bogus": 1}))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { column, .. } if column == "bogus"));
    }
}
