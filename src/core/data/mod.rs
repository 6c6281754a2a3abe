//! Data-access client: table-name driven CRUD over JSON rows plus a change
//! feed. `PgDataClient` talks to Postgres, `MemoryDataClient` keeps rows in
//! process.

pub mod memory;
pub mod postgres;
pub mod realtime;
pub mod tables;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use tokio::sync::broadcast;

pub use memory::MemoryDataClient;
pub use postgres::PgDataClient;
pub use realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind};
pub use tables::{ColumnSpec, ColumnType, Table, TableSpec};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid column: {0}")]
    InvalidColumn(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Database error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Direction,
}

/// Equality predicates, ordering and an optional limit for one select.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Vec<OrderBy>,
    pub limit: Option<i64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            direction: Direction::Asc,
        });
        self
    }

    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            direction: Direction::Desc,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Falls back to the table's key ordering when none was requested.
    pub fn with_default_order(mut self, table: Table) -> Self {
        if self.order.is_empty() {
            for column in table.spec().order_by {
                self = self.order_asc(column);
            }
        }
        self
    }

    pub fn filter_value(&self, column: &str) -> Option<&Value> {
        self.filters
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn validate(&self, table: Table) -> Result<(), DataError> {
        for (column, _) in &self.filters {
            if !table.has_column(column) {
                return Err(DataError::InvalidColumn(format!("{table}.{column}")));
            }
        }
        for order in &self.order {
            if !table.has_column(&order.column) {
                return Err(DataError::InvalidColumn(format!("{table}.{}", order.column)));
            }
        }
        Ok(())
    }
}

#[async_trait]
pub trait DataClient: Send + Sync {
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>, DataError>;

    async fn insert(&self, table: Table, row: Row) -> Result<Row, DataError>;

    async fn update(&self, table: Table, id: i64, patch: Row) -> Result<Row, DataError>;

    /// Insert, or update the row sharing the table's natural key.
    async fn upsert(&self, table: Table, row: Row) -> Result<Row, DataError>;

    /// Returns the number of rows removed.
    async fn delete(&self, table: Table, id: i64) -> Result<u64, DataError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    fn backend_name(&self) -> &'static str;
}

pub fn row_id(row: &Row) -> Option<i64> {
    row.get("id").and_then(Value::as_i64)
}

/// Compares two column values the way SQL equality on the column would:
/// numbers by numeric value, everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

/// Ordering used for `ORDER BY` emulation; nulls sort last like Postgres.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Keeps only known columns, dropping `id` and anything the table lacks.
pub fn project_columns(table: Table, row: &Row) -> Row {
    table
        .spec()
        .columns
        .iter()
        .filter_map(|c| row.get(c.name).map(|v| (c.name.to_string(), v.clone())))
        .collect()
}
