//! SQLite-backed store implementation
//!
//! Each logical table has fixed columns plus, for the syncable tables, a
//! `data` JSON document holding the table-specific fields. Reads flatten
//! the document back into the row; filters on document fields go through
//! `json_extract`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row as _, SqlitePool};

use super::{
    apply_defaults, now_timestamp, table_spec, ColumnType, Filter, FilterOp, Query, Row, Store,
    TableSpec,
};
use crate::error::StoreError;

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// Store over a SQLite pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Row>, StoreError> {
        let spec = table_spec(table)?;

        let mut sql = format!("SELECT * FROM {}", spec.name);
        let mut binds: Vec<Value> = Vec::new();

        if !query.filters.is_empty() {
            let mut clauses = Vec::with_capacity(query.filters.len());
            for filter in &query.filters {
                clauses.push(format!(
                    "{} {} ?",
                    column_expr(spec, &filter.column)?,
                    sql_op(filter.op)
                ));
                binds.push(filter.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !query.order_by.is_empty() {
            let mut terms = Vec::with_capacity(query.order_by.len());
            for (column, descending) in &query.order_by {
                terms.push(format!(
                    "{} {}",
                    column_expr(spec, column)?,
                    if *descending { "DESC" } else { "ASC" }
                ));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(|row| decode_row(spec, row)).collect()
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        let spec = table_spec(table)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let row = apply_defaults(spec, row);
            let (columns, values) = physical_values(spec, &row)?;
            let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();

            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                spec.name,
                columns.join(", "),
                placeholders.join(", ")
            );
            let mut q = sqlx::query(&sql);
            for value in &values {
                q = bind_value(q, value);
            }
            q.execute(&self.pool).await?;

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

        let mut set_terms: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        let mut payload_terms: Vec<String> = Vec::new();
        let mut payload_binds: Vec<Value> = Vec::new();

        for (key, value) in &changes {
            if spec.has_column(key) {
                set_terms.push(format!("{} = ?", key));
                binds.push(value.clone());
            } else if spec.document {
                if !valid_ident(key) {
                    return Err(unknown_column(spec, key));
                }
                match value {
                    Value::Array(_) | Value::Object(_) => {
                        payload_terms.push(format!("'$.{}', json(?)", key));
                        payload_binds.push(Value::String(value.to_string()));
                    }
                    _ => {
                        payload_terms.push(format!("'$.{}', ?", key));
                        payload_binds.push(value.clone());
                    }
                }
            } else {
                return Err(unknown_column(spec, key));
            }
        }

        // Rows in versioned tables advance updated_at on every write.
        if spec.document && !changes.contains_key("updated_at") {
            set_terms.push("updated_at = ?".to_string());
            binds.push(Value::String(now_timestamp()));
        }

        if !payload_terms.is_empty() {
            set_terms.push(format!("data = json_set(data, {})", payload_terms.join(", ")));
            binds.extend(payload_binds);
        }

        if set_terms.is_empty() {
            return Ok(0);
        }

        let mut sql = format!("UPDATE {} SET {}", spec.name, set_terms.join(", "));
        if !filters.is_empty() {
            let mut clauses = Vec::with_capacity(filters.len());
            for filter in &filters {
                clauses.push(format!(
                    "{} {} ?",
                    column_expr(spec, &filter.column)?,
                    sql_op(filter.op)
                ));
                binds.push(filter.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }

        Ok(q.execute(&self.pool).await?.rows_affected())
    }

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_keys: &[&str],
    ) -> Result<u64, StoreError> {
        let spec = table_spec(table)?;
        for key in conflict_keys {
            if !spec.has_column(key) {
                return Err(unknown_column(spec, key));
            }
        }

        // Applied row by row: the batch has no atomicity across rows, and a
        // concurrent read may observe it partially applied.
        let mut affected = 0u64;
        for row in rows {
            let row = apply_defaults(spec, row);
            let (columns, values) = physical_values(spec, &row)?;
            let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();

            // created_at survives conflicts: it is assigned once, on insert.
            let updates: Vec<String> = columns
                .iter()
                .copied()
                .filter(|c| !conflict_keys.contains(c) && *c != "created_at")
                .map(|c| format!("{} = excluded.{}", c, c))
                .collect();

            let sql = if updates.is_empty() {
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
                    spec.name,
                    columns.join(", "),
                    placeholders.join(", "),
                    conflict_keys.join(", ")
                )
            } else {
                format!(
                    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
                    spec.name,
                    columns.join(", "),
                    placeholders.join(", "),
                    conflict_keys.join(", "),
                    updates.join(", ")
                )
            };

            let mut q = sqlx::query(&sql);
            for value in &values {
                q = bind_value(q, value);
            }
            affected += q.execute(&self.pool).await?.rows_affected();
        }

        Ok(affected)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, StoreError> {
        let spec = table_spec(table)?;

        let mut sql = format!("DELETE FROM {}", spec.name);
        let mut binds: Vec<Value> = Vec::new();
        if !filters.is_empty() {
            let mut clauses = Vec::with_capacity(filters.len());
            for filter in &filters {
                clauses.push(format!(
                    "{} {} ?",
                    column_expr(spec, &filter.column)?,
                    sql_op(filter.op)
                ));
                binds.push(filter.value.clone());
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = bind_value(q, value);
        }

        Ok(q.execute(&self.pool).await?.rows_affected())
    }
}

fn sql_op(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "=",
        FilterOp::Gte => ">=",
        FilterOp::Lte => "<=",
    }
}

/// Column names come from crate code, never from request payloads, but the
/// identifier check keeps a typo from turning into SQL.
fn valid_ident(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unknown_column(spec: &TableSpec, column: &str) -> StoreError {
    StoreError::UnknownColumn {
        table: spec.name.to_string(),
        column: column.to_string(),
    }
}

/// SQL expression addressing a column: the column itself when physical,
/// `json_extract` into the payload for document tables.
fn column_expr(spec: &TableSpec, column: &str) -> Result<String, StoreError> {
    if !valid_ident(column) {
        return Err(unknown_column(spec, column));
    }
    if spec.has_column(column) {
        Ok(column.to_string())
    } else if spec.document && column != "data" {
        Ok(format!("json_extract(data, '$.{}')", column))
    } else {
        Err(unknown_column(spec, column))
    }
}

/// Split a logical row into physical columns and, for document tables, the
/// serialized payload.
fn physical_values(spec: &TableSpec, row: &Row) -> Result<(Vec<&'static str>, Vec<Value>), StoreError> {
    let mut columns: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    for column in spec.columns {
        if let Some(value) = row.get(column.name) {
            columns.push(column.name);
            values.push(value.clone());
        }
    }

    if spec.document {
        let mut payload = Row::new();
        for (key, value) in row {
            if !spec.has_column(key) {
                payload.insert(key.clone(), value.clone());
            }
        }
        columns.push("data");
        values.push(Value::String(Value::Object(payload).to_string()));
    } else if let Some(key) = row.keys().find(|k| !spec.has_column(k)) {
        return Err(unknown_column(spec, key));
    }

    Ok((columns, values))
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Rebuild the logical row: payload fields first, fixed columns on top so
/// server-stamped values win any collision.
fn decode_row(spec: &TableSpec, row: &SqliteRow) -> Result<Row, StoreError> {
    let mut out = Row::new();

    if spec.document {
        let data: String = row.try_get("data")?;
        if let Value::Object(fields) = serde_json::from_str(&data)? {
            out.extend(fields);
        }
    }

    for column in spec.columns {
        let value = match column.ty {
            ColumnType::Text => row
                .try_get::<Option<String>, _>(column.name)?
                .map_or(Value::Null, Value::String),
            ColumnType::Int => Value::from(row.try_get::<i64, _>(column.name)?),
            ColumnType::Bool => Value::Bool(row.try_get::<i64, _>(column.name)? != 0),
        };
        out.insert(column.name.to_string(), value);
    }

    Ok(out)
}
