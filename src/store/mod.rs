//! Tabular store capability
//!
//! The sync engines and CRUD routes never talk to SQLite directly. They go
//! through the [`Store`] trait, which mirrors the hosted-database query
//! surface the clients were built against: select with filter chains,
//! insert, update, delete, and upsert keyed by arbitrary conflict columns.
//! Production uses [`SqliteStore`]; tests use [`MemoryStore`].
//!
//! Nothing in this layer scopes queries by user. Callers add the `user_id`
//! filter themselves, always.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

/// A stored row: column name to JSON value.
pub type Row = serde_json::Map<String, Value>;

/// Comparison operators supported by filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

/// One column predicate. Filters on a query are conjunctive.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        Filter {
            column: column.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::new(column, FilterOp::Eq, value)
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Filter::new(column, FilterOp::Gte, value)
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Filter::new(column, FilterOp::Lte, value)
    }
}

/// Query shape for [`Store::select`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<u32>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::gte(column, value));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::lte(column, value));
        self
    }

    /// Add an ordering term. `descending = true` sorts newest-style values
    /// first.
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order_by.push((column.to_string(), descending));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Capability surface over the tabular store.
///
/// Write semantics shared by both implementations:
/// - `insert` fills server defaults for omitted columns (`id`, `created_at`,
///   `updated_at`, where the table has them) and returns the stored rows.
/// - `update` writes the given columns on every matching row; tables that
///   version their rows get `updated_at` stamped even when the caller
///   omits it.
/// - `upsert` writes the columns present in each input row; on conflict,
///   absent columns keep their stored values and `created_at` is never
///   overwritten. Returns the number of rows the store reports as affected.
#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: &str, query: Query) -> Result<Vec<Row>, StoreError>;

    async fn insert(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    async fn update(
        &self,
        table: &str,
        changes: Row,
        filters: Vec<Filter>,
    ) -> Result<u64, StoreError>;

    async fn upsert(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_keys: &[&str],
    ) -> Result<u64, StoreError>;

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<u64, StoreError>;
}

/// Column types the physical layout distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Text,
    Int,
    Bool,
}

#[derive(Debug)]
pub(crate) struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
}

/// Layout of one logical table. `document` tables keep their table-specific
/// fields in a JSON `data` column; their fixed columns are the ones the sync
/// protocol reads.
#[derive(Debug)]
pub(crate) struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub document: bool,
}

impl TableSpec {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

const DOCUMENT_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: "id",
        ty: ColumnType::Text,
    },
    ColumnSpec {
        name: "user_id",
        ty: ColumnType::Text,
    },
    ColumnSpec {
        name: "created_at",
        ty: ColumnType::Text,
    },
    ColumnSpec {
        name: "updated_at",
        ty: ColumnType::Text,
    },
];

pub(crate) const TABLES: &[TableSpec] = &[
    TableSpec {
        name: "user_devices",
        columns: &[
            ColumnSpec {
                name: "user_id",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "device_id",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "device_name",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "device_type",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "is_active",
                ty: ColumnType::Bool,
            },
            ColumnSpec {
                name: "last_sync",
                ty: ColumnType::Text,
            },
        ],
        document: false,
    },
    TableSpec {
        name: "sync_logs",
        columns: &[
            ColumnSpec {
                name: "user_id",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "device_id",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "table_name",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "operation",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "records_count",
                ty: ColumnType::Int,
            },
            ColumnSpec {
                name: "success",
                ty: ColumnType::Bool,
            },
            ColumnSpec {
                name: "error_message",
                ty: ColumnType::Text,
            },
            ColumnSpec {
                name: "created_at",
                ty: ColumnType::Text,
            },
        ],
        document: false,
    },
    TableSpec {
        name: "classes",
        columns: DOCUMENT_COLUMNS,
        document: true,
    },
    TableSpec {
        name: "tasks",
        columns: DOCUMENT_COLUMNS,
        document: true,
    },
    TableSpec {
        name: "calendar_events",
        columns: DOCUMENT_COLUMNS,
        document: true,
    },
    TableSpec {
        name: "habits",
        columns: DOCUMENT_COLUMNS,
        document: true,
    },
    TableSpec {
        name: "habit_logs",
        columns: DOCUMENT_COLUMNS,
        document: true,
    },
];

pub(crate) fn table_spec(name: &str) -> Result<&'static TableSpec, StoreError> {
    TABLES
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
}

/// Fill server defaults for columns the caller omitted or sent as null.
pub(crate) fn apply_defaults(spec: &TableSpec, mut row: Row) -> Row {
    let missing = |row: &Row, key: &str| row.get(key).map_or(true, Value::is_null);

    if spec.has_column("id") && missing(&row, "id") {
        row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    }
    let now = now_timestamp();
    if spec.has_column("created_at") && missing(&row, "created_at") {
        row.insert("created_at".to_string(), Value::String(now.clone()));
    }
    if spec.has_column("updated_at") && missing(&row, "updated_at") {
        row.insert("updated_at".to_string(), Value::String(now));
    }
    row
}

/// Fixed-width UTC timestamp. String comparison matches time order, which
/// the watermark range queries rely on.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current server time in store format.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
