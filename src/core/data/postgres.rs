//! Postgres backend. Statements are built from the static table registry, so
//! identifiers never come from user input; values always travel as typed
//! binds. Rows come back as `row_to_json` text and are decoded to JSON maps.

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::result::DatabaseErrorKind;
use diesel::sql_types::{BigInt, Bool, Date, Double, Integer, Nullable, Text};
use log::{debug, error};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{
    project_columns, ChangeEvent, ChangeFeed, ChangeKind, ColumnType, DataClient, DataError,
    Direction, Query, Row, Table,
};
use crate::core::shared::utils::DbPool;

#[derive(Debug, QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Text)]
    row: String,
}

#[derive(Debug, QueryableByName)]
struct UpsertRow {
    #[diesel(sql_type = Text, column_name = row)]
    row_json: String,
    #[diesel(sql_type = Bool)]
    inserted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(Option<i32>),
    BigInt(i64),
    Float(Option<f64>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Bool(Option<bool>),
}

type Boxed = BoxedSqlQuery<'static, Pg, SqlQuery>;

fn apply_binds(sql: &str, binds: Vec<BindValue>) -> Boxed {
    let mut query: Boxed = diesel::sql_query(sql.to_string()).into_boxed::<Pg>();
    for bind in binds {
        query = match bind {
            BindValue::Int(v) => query.bind::<Nullable<Integer>, _>(v),
            BindValue::BigInt(v) => query.bind::<BigInt, _>(v),
            BindValue::Float(v) => query.bind::<Nullable<Double>, _>(v),
            BindValue::Text(v) => query.bind::<Nullable<Text>, _>(v),
            BindValue::Date(v) => query.bind::<Nullable<Date>, _>(v),
            BindValue::Bool(v) => query.bind::<Nullable<Bool>, _>(v),
        };
    }
    query
}

fn invalid(column: &str, value: &Value) -> DataError {
    DataError::InvalidValue(format!("{column}: {value}"))
}

/// Converts a JSON value into the bind matching the column's SQL type.
pub fn to_bind(table: Table, column: &str, value: &Value) -> Result<BindValue, DataError> {
    if column == "id" {
        return value
            .as_i64()
            .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
            .map(BindValue::BigInt)
            .ok_or_else(|| invalid(column, value));
    }
    let spec = table
        .column(column)
        .ok_or_else(|| DataError::InvalidColumn(format!("{table}.{column}")))?;

    if value.is_null() {
        return Ok(match spec.ty {
            ColumnType::Int => BindValue::Int(None),
            ColumnType::Float => BindValue::Float(None),
            ColumnType::Text => BindValue::Text(None),
            ColumnType::Date => BindValue::Date(None),
            ColumnType::Bool => BindValue::Bool(None),
        });
    }

    let bind = match spec.ty {
        ColumnType::Int => {
            let n = match value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            let n = n
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| invalid(column, value))?;
            BindValue::Int(Some(n))
        }
        ColumnType::Float => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            BindValue::Float(Some(f.ok_or_else(|| invalid(column, value))?))
        }
        ColumnType::Text => match value {
            Value::String(s) => BindValue::Text(Some(s.clone())),
            Value::Number(_) | Value::Bool(_) => BindValue::Text(Some(value.to_string())),
            _ => return Err(invalid(column, value)),
        },
        ColumnType::Date => {
            let date = value
                .as_str()
                .and_then(|s| s.get(..10))
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .ok_or_else(|| invalid(column, value))?;
            BindValue::Date(Some(date))
        }
        ColumnType::Bool => {
            let b = match value {
                Value::Bool(b) => Some(*b),
                Value::String(s) => s.parse::<bool>().ok(),
                Value::Number(n) => n.as_i64().map(|n| n != 0),
                _ => None,
            };
            BindValue::Bool(Some(b.ok_or_else(|| invalid(column, value))?))
        }
    };
    Ok(bind)
}

fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

pub fn select_sql(table: Table, query: &Query) -> Result<(String, Vec<BindValue>), DataError> {
    query.validate(table)?;
    let mut sql = format!(
        "SELECT row_to_json(t)::text AS row FROM {} t",
        quote(table.name())
    );
    let mut binds = Vec::new();
    for (i, (column, value)) in query.filters.iter().enumerate() {
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&format!("t.{} = ${}", quote(column), i + 1));
        binds.push(to_bind(table, column, value)?);
    }
    if !query.order.is_empty() {
        let order: Vec<String> = query
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                format!("t.{} {dir}", quote(&o.column))
            })
            .collect();
        sql.push_str(&format!(" ORDER BY {}", order.join(", ")));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit.max(0)));
    }
    Ok((sql, binds))
}

fn insert_parts(table: Table, row: &Row) -> Result<(Vec<String>, Vec<BindValue>), DataError> {
    let projected = project_columns(table, row);
    let mut columns = Vec::with_capacity(projected.len());
    let mut binds = Vec::with_capacity(projected.len());
    for (column, value) in &projected {
        columns.push(column.clone());
        binds.push(to_bind(table, column, value)?);
    }
    Ok((columns, binds))
}

pub fn insert_sql(table: Table, row: &Row) -> Result<(String, Vec<BindValue>), DataError> {
    let (columns, binds) = insert_parts(table, row)?;
    if columns.is_empty() {
        return Err(DataError::InvalidValue(format!("empty row for {table}")));
    }
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "INSERT INTO {} AS t ({}) VALUES ({}) RETURNING row_to_json(t)::text AS row",
        quote(table.name()),
        columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", ")
    );
    Ok((sql, binds))
}

pub fn upsert_sql(table: Table, row: &Row) -> Result<(String, Vec<BindValue>), DataError> {
    let key = table.spec().natural_key;
    let (columns, binds) = insert_parts(table, row)?;
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let mut updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(&c.as_str()))
        .map(|c| format!("{0} = EXCLUDED.{0}", quote(c)))
        .collect();
    if updates.is_empty() {
        // every submitted column is part of the key; touch the first one so
        // RETURNING still yields the row
        updates.push(format!("{0} = EXCLUDED.{0}", quote(key[0])));
    }
    let sql = format!(
        "INSERT INTO {} AS t ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {} \
         RETURNING row_to_json(t)::text AS row, (t.xmax = 0) AS inserted",
        quote(table.name()),
        columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", "),
        key.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
        updates.join(", ")
    );
    Ok((sql, binds))
}

pub fn update_sql(table: Table, id: i64, patch: &Row) -> Result<(String, Vec<BindValue>), DataError> {
    let (columns, mut binds) = insert_parts(table, patch)?;
    if columns.is_empty() {
        binds.push(BindValue::BigInt(id));
        let sql = format!(
            "SELECT row_to_json(t)::text AS row FROM {} t WHERE t.id = $1",
            quote(table.name())
        );
        return Ok((sql, binds));
    }
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote(c), i + 1))
        .collect();
    binds.push(BindValue::BigInt(id));
    let sql = format!(
        "UPDATE {} AS t SET {} WHERE t.id = ${} RETURNING row_to_json(t)::text AS row",
        quote(table.name()),
        sets.join(", "),
        binds.len()
    );
    Ok((sql, binds))
}

fn map_diesel(e: diesel::result::Error) -> DataError {
    match e {
        diesel::result::Error::NotFound => DataError::NotFound("row not found".to_string()),
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DataError::Conflict(info.message().to_string())
        }
        diesel::result::Error::DatabaseError(DatabaseErrorKind::NotNullViolation, info)
        | diesel::result::Error::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
            DataError::InvalidValue(info.message().to_string())
        }
        other => DataError::Backend(other.to_string()),
    }
}

fn decode(text: &str) -> Result<Row, DataError> {
    serde_json::from_str::<Row>(text).map_err(|e| DataError::Backend(format!("Bad row JSON: {e}")))
}

pub struct PgDataClient {
    pool: DbPool,
    feed: ChangeFeed,
}

impl PgDataClient {
    pub fn new(pool: DbPool, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, DataError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DataError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DataError::Backend(format!("DB connection error: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e: tokio::task::JoinError| DataError::Backend(e.to_string()))?
    }
}

impl std::fmt::Debug for PgDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgDataClient")
            .field("pool", &"DbPool")
            .finish()
    }
}

#[async_trait]
impl DataClient for PgDataClient {
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Row>, DataError> {
        let (sql, binds) = select_sql(table, &query)?;
        debug!("select {table}: {sql}");
        let rows = self
            .run(move |conn| {
                apply_binds(&sql, binds)
                    .load::<JsonRow>(conn)
                    .map_err(map_diesel)
            })
            .await
            .map_err(|e| {
                error!("select on {table} failed: {e}");
                e
            })?;
        rows.iter().map(|r| decode(&r.row)).collect()
    }

    async fn insert(&self, table: Table, row: Row) -> Result<Row, DataError> {
        let (sql, binds) = insert_sql(table, &row)?;
        let stored = self
            .run(move |conn| {
                apply_binds(&sql, binds)
                    .get_result::<JsonRow>(conn)
                    .map_err(map_diesel)
            })
            .await
            .and_then(|r| decode(&r.row))?;
        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Insert, stored.clone()));
        Ok(stored)
    }

    async fn update(&self, table: Table, id: i64, patch: Row) -> Result<Row, DataError> {
        let (sql, binds) = update_sql(table, id, &patch)?;
        let stored = self
            .run(move |conn| {
                apply_binds(&sql, binds)
                    .get_result::<JsonRow>(conn)
                    .optional()
                    .map_err(map_diesel)
            })
            .await?
            .ok_or_else(|| DataError::NotFound(format!("{} id {id}", table.name())))
            .and_then(|r| decode(&r.row))?;
        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Update, stored.clone()));
        Ok(stored)
    }

    async fn upsert(&self, table: Table, row: Row) -> Result<Row, DataError> {
        if table.spec().natural_key.is_empty() {
            return self.insert(table, row).await;
        }
        let (sql, binds) = upsert_sql(table, &row)?;
        let result = self
            .run(move |conn| {
                apply_binds(&sql, binds)
                    .get_result::<UpsertRow>(conn)
                    .map_err(map_diesel)
            })
            .await?;
        let stored = decode(&result.row_json)?;
        let kind = if result.inserted {
            ChangeKind::Insert
        } else {
            ChangeKind::Update
        };
        self.feed
            .publish(ChangeEvent::new(table, kind, stored.clone()));
        Ok(stored)
    }

    async fn delete(&self, table: Table, id: i64) -> Result<u64, DataError> {
        let sql = format!(
            "DELETE FROM {} AS t WHERE t.id = $1 RETURNING row_to_json(t)::text AS row",
            quote(table.name())
        );
        let removed = self
            .run(move |conn| {
                apply_binds(&sql, vec![BindValue::BigInt(id)])
                    .load::<JsonRow>(conn)
                    .map_err(map_diesel)
            })
            .await?;
        for r in &removed {
            if let Ok(row) = decode(&r.row) {
                self.feed
                    .publish(ChangeEvent::new(table, ChangeKind::Delete, row));
            }
        }
        Ok(removed.len() as u64)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
